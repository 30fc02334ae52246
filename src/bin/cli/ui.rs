use nu_ansi_term::{Color, Style};
use std::fmt::Display;
use std::io::IsTerminal;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// Terminal printer for the text output format.
pub struct Ui {
    palette: Palette,
    paint: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let paint = !quiet && theme != Theme::Plain && std::io::stdout().is_terminal();

        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        let palette = match theme {
            Theme::Plain => Palette::plain(),
            Theme::Light => Palette::light(),
            Theme::Dark | Theme::Auto => Palette::dark(),
        };
        Self {
            palette,
            paint,
            quiet,
        }
    }

    pub fn spacer(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// Aligned `key: value` rows under a heading. Nothing is printed for an
    /// empty section.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        if rows.is_empty() {
            return;
        }
        self.heading(title);
        let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in rows {
            let key = format!("{key:>width$}:");
            println!("  {} {}", self.paint(&self.palette.key, &key), self.paint(&self.palette.value, &value));
        }
    }

    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let entries: Vec<String> = entries.into_iter().collect();
        if entries.is_empty() {
            return;
        }
        self.heading(title);
        let bullet = if self.paint { "•" } else { "-" };
        for entry in entries {
            println!("  {} {entry}", self.paint(&self.palette.bullet, bullet));
        }
    }

    /// Statement text with keywords and `:paramN` placeholders highlighted.
    pub fn statement(&self, text: &str) {
        if !self.paint {
            println!("{text}");
            return;
        }
        let painted: Vec<String> = text
            .split(' ')
            .map(|word| {
                if word.starts_with(':') || word.contains("(:") {
                    self.palette.placeholder.paint(word).to_string()
                } else if KEYWORDS.contains(&word) {
                    self.palette.keyword.paint(word).to_string()
                } else {
                    word.to_owned()
                }
            })
            .collect();
        println!("{}", painted.join(" "));
    }

    pub fn info(&self, message: &str) {
        self.status(&self.palette.info, INFO_ICON, message, false);
    }

    pub fn success(&self, message: &str) {
        self.status(&self.palette.success, SUCCESS_ICON, message, false);
    }

    pub fn warn(&self, message: &str) {
        self.status(&self.palette.warn, WARNING_ICON, message, true);
    }

    fn status(&self, style: &Style, icon: &str, message: &str, stderr: bool) {
        let line = if self.quiet {
            message.to_owned()
        } else {
            format!("{} {message}", self.paint(style, icon))
        };
        if stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else {
            let title = format!("{HEADING_ICON} {title}");
            println!("{}", self.paint(&self.palette.heading, &title));
        }
    }

    fn paint(&self, style: &Style, text: &str) -> String {
        if self.paint {
            style.paint(text).to_string()
        } else {
            text.to_owned()
        }
    }
}

struct Palette {
    heading: Style,
    key: Style,
    value: Style,
    bullet: Style,
    keyword: Style,
    placeholder: Style,
    info: Style,
    success: Style,
    warn: Style,
}

impl Palette {
    fn dark() -> Self {
        Self {
            heading: Style::new().fg(Color::Purple).bold(),
            key: Style::new().fg(Color::LightBlue).bold(),
            value: Style::new().fg(Color::White),
            bullet: Style::new().fg(Color::LightBlue),
            keyword: Style::new().fg(Color::LightMagenta).bold(),
            placeholder: Style::new().fg(Color::LightYellow),
            info: Style::new().fg(Color::LightCyan),
            success: Style::new().fg(Color::LightGreen).bold(),
            warn: Style::new().fg(Color::Yellow).bold(),
        }
    }

    fn light() -> Self {
        Self {
            heading: Style::new().fg(Color::Blue).bold(),
            key: Style::new().fg(Color::Black).bold(),
            value: Style::new().fg(Color::Black),
            bullet: Style::new().fg(Color::Blue),
            keyword: Style::new().fg(Color::Magenta).bold(),
            placeholder: Style::new().fg(Color::Red),
            info: Style::new().fg(Color::Purple),
            success: Style::new().fg(Color::Green).bold(),
            warn: Style::new().fg(Color::Red).bold(),
        }
    }

    fn plain() -> Self {
        Self {
            heading: Style::new(),
            key: Style::new(),
            value: Style::new(),
            bullet: Style::new(),
            keyword: Style::new(),
            placeholder: Style::new(),
            info: Style::new(),
            success: Style::new(),
            warn: Style::new(),
        }
    }
}

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "IS", "NULL", "MATCH", "RETURN",
    "DISTINCT", "TRAVERSE", "MAXDEPTH", "ORDER", "BY", "ASC", "DESC", "SKIP", "LIMIT", "AS",
    "CONTAINS", "CONTAINSALL", "CONTAINSANY", "CONTAINSTEXT", "GROUP",
];

const HEADING_ICON: &str = "▸";
const SUCCESS_ICON: &str = "✔";
const WARNING_ICON: &str = "⚠";
const INFO_ICON: &str = "ℹ";
