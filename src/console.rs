//! Terminal frontend driven by crossterm key events.
//!
//! Every edit of the query line is passed on as a new query, so the picker sees one update per
//! keystroke. Up/Down (or Tab) move the selection, Alt+digit picks an item directly, Enter
//! accepts and Esc or Ctrl+C cancels. Digits themselves belong to the query since issue
//! identifiers contain them.

use crate::picker::{Frontend, Input, Notice, PickerItem, View};

use async_trait::async_trait;
use colored::*;
use crossterm::cursor::{MoveToColumn, MoveToPreviousLine};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};
use futures::StreamExt;
use std::io::{self, Write};

pub const KEYS: &str = "type to search, Up/Down or Tab to move, Alt+<n> to pick item n, \
                        Enter to accept, Esc to cancel";

/// Effect of a single key on an edit buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Changed,
    Submit,
    Abort,
    /// Alt+digit
    Pick(usize),
    Move(isize),
    Ignored,
}

fn edit(buf: &mut String, key: KeyEvent) -> Edit {
    if key.kind == KeyEventKind::Release {
        return Edit::Ignored;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Edit::Abort,
        KeyCode::Char('u') if ctrl => {
            if buf.is_empty() {
                return Edit::Ignored;
            }
            buf.clear();
            Edit::Changed
        }
        KeyCode::Char('w') if ctrl => {
            let kept = buf.trim_end().rfind(char::is_whitespace).map_or(0, |i| i + 1);
            if kept == buf.len() {
                return Edit::Ignored;
            }
            buf.truncate(kept);
            Edit::Changed
        }
        KeyCode::Char('n') if ctrl => Edit::Move(1),
        KeyCode::Char('p') if ctrl => Edit::Move(-1),
        KeyCode::Char(c) if alt => match c.to_digit(10) {
            Some(d) if d > 0 => Edit::Pick(d as usize),
            _ => Edit::Ignored,
        },
        KeyCode::Char(_) if ctrl => Edit::Ignored,
        KeyCode::Char(c) => {
            buf.push(c);
            Edit::Changed
        }
        KeyCode::Backspace => match buf.pop() {
            Some(_) => Edit::Changed,
            None => Edit::Ignored,
        },
        KeyCode::Enter => Edit::Submit,
        KeyCode::Esc => Edit::Abort,
        KeyCode::Down | KeyCode::Tab => Edit::Move(1),
        KeyCode::Up | KeyCode::BackTab => Edit::Move(-1),
        _ => Edit::Ignored,
    }
}

/// Moves `from` by `delta` within 1..=count
fn step(from: usize, delta: isize, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let to = from as isize + delta;
    to.max(1).min(count as isize) as usize
}

/// Number of the selectable item which the picker would accept on Enter
fn highlighted_number(view: &View) -> Option<usize> {
    let h = view.highlighted()?;
    view.selectable().find(|(_, i)| *i == h).map(|(n, _)| n)
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_owned();
    }
    let mut s: String = text.chars().take(width.saturating_sub(1)).collect();
    s.push('~');
    s
}

/// Lines of one picker frame. `cursor` is the selected item number.
fn frame(view: &View, cursor: Option<usize>, width: usize) -> Vec<String> {
    let status = if view.busy { " searching...".dimmed() } else { "".normal() };
    let mut lines = vec![format!("{} {}{}", "search:".cyan(), view.query, status)];
    let mut numbers = view.selectable().map(|(n, _)| n);
    for item in &view.items {
        lines.push(match item {
            PickerItem::Action { .. } | PickerItem::Issue(_) => {
                let n = numbers.next().unwrap_or_default();
                let marker = if cursor == Some(n) { ">" } else { " " };
                let text = match item {
                    PickerItem::Issue(issue) => clip(&format!("{:#}", issue), width.saturating_sub(7)),
                    _ => clip(&item_label(item), width.saturating_sub(7)).green().to_string(),
                };
                format!("{} {:>3}) {}", marker, n, text)
            }
            PickerItem::Separator => format!("  {}", "-".repeat(40.min(width)).dimmed()),
            PickerItem::Busy => format!("       {}", "loading...".dimmed()),
        });
    }
    if view.issues().next().is_none() && !view.items.contains(&PickerItem::Busy) {
        lines.push(format!("       {}", "no matching issues".dimmed()));
    }
    lines
}

fn item_label(item: &PickerItem) -> String {
    match item {
        PickerItem::Action { label, .. } => label.clone(),
        PickerItem::Issue(issue) => issue.to_string(),
        _ => String::new(),
    }
}

/// Raw mode for as long as the guard lives
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Cannot restore terminal mode: {}", e);
        }
    }
}

pub struct Console {
    events: EventStream,
    query: String,
    view: Option<View>,
    /// Selected item number, `None` follows the picker's highlight
    cursor: Option<usize>,
    /// Lines of the current frame, erased before redrawing
    drawn: u16,
}

impl Console {
    pub fn new() -> Self {
        Self {
            events: EventStream::new(),
            query: String::new(),
            view: None,
            cursor: None,
            drawn: 0,
        }
    }

    /// Next key press. Raw mode is only active while waiting, so that output in between
    /// (including log messages) behaves normally.
    async fn next_key(&mut self) -> Option<KeyEvent> {
        let _raw = match RawMode::enable() {
            Ok(r) => r,
            Err(e) => {
                error!("Cannot switch terminal to raw mode: {}", e);
                return None;
            }
        };
        while let Some(event) = self.events.next().await {
            match event {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => return Some(key),
                Ok(_) => (),
                Err(e) => {
                    error!("Cannot read terminal input: {}", e);
                    return None;
                }
            }
        }
        None
    }

    fn width() -> usize {
        terminal::size().map(|(w, _)| w as usize).unwrap_or(80)
    }

    fn erase(&mut self) -> io::Result<()> {
        let mut err = io::stderr();
        if self.drawn > 0 {
            queue!(err, MoveToPreviousLine(self.drawn))?;
        } else {
            queue!(err, MoveToColumn(0))?;
        }
        execute!(err, Clear(ClearType::FromCursorDown))?;
        self.drawn = 0;
        Ok(())
    }

    fn draw(&mut self, lines: &[String]) -> io::Result<()> {
        self.erase()?;
        let mut err = io::stderr();
        for l in lines {
            // explicit CR: this may run while raw mode is active
            write!(err, "{}\r\n", l)?;
        }
        err.flush()?;
        self.drawn = lines.len() as u16;
        Ok(())
    }

    fn redraw(&mut self) {
        if let Some(view) = &self.view {
            let cursor = self.cursor.or_else(|| highlighted_number(view));
            let lines = frame(view, cursor, Self::width());
            if let Err(e) = self.draw(&lines) {
                warn!("Cannot draw picker: {}", e);
            }
        }
    }

    /// Leaves the current frame on screen and starts below it
    fn detach(&mut self) {
        self.drawn = 0;
        self.view = None;
        self.cursor = None;
        self.query.clear();
    }

    fn show_line(&self, prompt: &str, buf: &str) -> io::Result<()> {
        let mut err = io::stderr();
        queue!(err, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        write!(err, "{} {}", prompt.bold(), buf)?;
        err.flush()
    }
}

#[async_trait]
impl Frontend for Console {
    fn render(&mut self, view: &View) {
        let count = view.selectable().count();
        if self.cursor.map_or(false, |c| c > count) {
            self.cursor = None;
        }
        // a new picker starts with the query it reports
        if self.view.is_none() {
            self.query = view.query.clone();
        }
        self.view = Some(view.clone());
        self.redraw();
    }

    fn notice(&mut self, notice: Notice) {
        if let Err(e) = self.erase() {
            warn!("Cannot clear picker: {}", e);
        }
        match notice {
            Notice::Info(msg) => eprintln!("{}", msg.green()),
            Notice::Error(msg) => eprintln!("{} {}", "error:".red().bold(), msg),
        }
        self.redraw();
    }

    async fn next_input(&mut self) -> Option<Input> {
        loop {
            let key = self.next_key().await?;
            match edit(&mut self.query, key) {
                Edit::Changed => {
                    self.cursor = None;
                    return Some(Input::Query(self.query.clone()));
                }
                Edit::Submit => return Some(Input::Accept(self.cursor)),
                Edit::Pick(n) => return Some(Input::Accept(Some(n))),
                Edit::Abort => {
                    self.detach();
                    return Some(Input::Cancel);
                }
                Edit::Move(delta) => {
                    if let Some(view) = &self.view {
                        let count = view.selectable().count();
                        let from = self.cursor.or_else(|| highlighted_number(view)).unwrap_or(0);
                        self.cursor = Some(step(from, delta, count)).filter(|n| *n > 0);
                        self.redraw();
                    }
                }
                Edit::Ignored => (),
            }
        }
    }

    async fn ask(&mut self, question: &str, default: &str) -> Option<String> {
        self.detach();
        let prompt = if default.is_empty() {
            format!("{}:", question)
        } else {
            format!("{} [{}]:", question, default)
        };
        let mut buf = String::new();
        let answer = loop {
            if let Err(e) = self.show_line(&prompt, &buf) {
                warn!("Cannot show prompt: {}", e);
            }
            match edit(&mut buf, self.next_key().await?) {
                Edit::Submit => break Some(buf),
                Edit::Abort => break None,
                _ => (),
            }
        };
        eprintln!();
        let answer = answer?;
        let answer = answer.trim();
        Some(if answer.is_empty() { default } else { answer }.to_owned())
    }

    async fn choose(&mut self, question: &str, options: &[&str]) -> Option<usize> {
        self.detach();
        eprintln!("\n{}", question.cyan());
        let mut cursor = 1;
        loop {
            let lines: Vec<String> = options
                .iter()
                .enumerate()
                .map(|(n, opt)| {
                    let marker = if n + 1 == cursor { ">" } else { " " };
                    format!("{} {:>3}) {}", marker, n + 1, opt)
                })
                .collect();
            if let Err(e) = self.draw(&lines) {
                warn!("Cannot draw choices: {}", e);
            }
            let mut buf = String::new();
            match edit(&mut buf, self.next_key().await?) {
                Edit::Changed => {
                    if let Some(n) = buf.parse::<usize>().ok().filter(|n| (1..=options.len()).contains(n)) {
                        cursor = n;
                        break;
                    }
                }
                Edit::Pick(n) if n <= options.len() => {
                    cursor = n;
                    break;
                }
                Edit::Move(delta) => cursor = step(cursor, delta, options.len()),
                Edit::Submit => break,
                Edit::Abort => {
                    self.drawn = 0;
                    return None;
                }
                _ => (),
            }
        }
        self.drawn = 0;
        Some(cursor - 1)
    }

    fn help(&self) -> Option<String> {
        Some(KEYS.to_owned())
    }
}
