//! Argument quoting.
//!
//! Task arguments always reach the child process verbatim as separate argv
//! entries. Quoting only matters when a command line is rendered as text,
//! for echoing it to the console before a task runs.

use crate::model::{ShellQuotedString, ShellQuoting, TaskArg};

/// Shell dialect used to render a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    Posix,
    Cmd,
}

impl ShellFlavor {
    pub fn native() -> Self {
        if cfg!(windows) {
            ShellFlavor::Cmd
        } else {
            ShellFlavor::Posix
        }
    }
}

/// Wrap a value with strong quoting: no expansion, no splitting.
pub fn strong(value: impl Into<String>) -> TaskArg {
    TaskArg::Quoted(ShellQuotedString {
        value: value.into(),
        quoting: ShellQuoting::Strong,
    })
}

fn is_posix_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c)
}

fn render_posix(q: &ShellQuotedString) -> String {
    match q.quoting {
        ShellQuoting::Strong => format!("'{}'", q.value.replace('\'', r"'\''")),
        ShellQuoting::Weak => {
            let mut out = String::with_capacity(q.value.len() + 2);
            out.push('"');
            for c in q.value.chars() {
                if matches!(c, '"' | '\\' | '`') {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
            out
        }
        ShellQuoting::Escape => {
            if q.value.is_empty() {
                return "''".to_string();
            }
            let mut out = String::with_capacity(q.value.len());
            for c in q.value.chars() {
                if !is_posix_safe(c) {
                    out.push('\\');
                }
                out.push(c);
            }
            out
        }
    }
}

fn render_cmd(q: &ShellQuotedString) -> String {
    match q.quoting {
        ShellQuoting::Strong | ShellQuoting::Weak => {
            format!("\"{}\"", q.value.replace('"', "\"\""))
        }
        ShellQuoting::Escape => {
            let mut out = String::with_capacity(q.value.len());
            for c in q.value.chars() {
                if matches!(c, '&' | '|' | '<' | '>' | '^' | '(' | ')' | ' ' | '"') {
                    out.push('^');
                }
                out.push(c);
            }
            out
        }
    }
}

/// Render one argument as shell text.
pub fn render_arg(arg: &TaskArg, flavor: ShellFlavor) -> String {
    match arg {
        TaskArg::Plain(s) => s.clone(),
        TaskArg::Quoted(q) => match flavor {
            ShellFlavor::Posix => render_posix(q),
            ShellFlavor::Cmd => render_cmd(q),
        },
    }
}

/// Render a whole command line, e.g. for echoing before a task runs.
pub fn render_command_line(command: &str, args: &[TaskArg], flavor: ShellFlavor) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(command.to_string());
    parts.extend(args.iter().map(|a| render_arg(a, flavor)));
    parts.join(" ")
}

/// Text typed into a run terminal to start an executable jar.
pub fn run_command_text(executable: &str) -> String {
    format!("java -jar \"{executable}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoted(value: &str, quoting: ShellQuoting) -> TaskArg {
        TaskArg::Quoted(ShellQuotedString {
            value: value.into(),
            quoting,
        })
    }

    #[test]
    fn strong_keeps_value_verbatim() {
        let arg = strong("/home/me/My Files/a$b.jvs");
        assert_eq!(arg.value(), "/home/me/My Files/a$b.jvs");
    }

    #[test]
    fn posix_strong_quotes_single_quotes() {
        let arg = strong("it's here");
        assert_eq!(render_arg(&arg, ShellFlavor::Posix), r"'it'\''s here'");
    }

    #[test]
    fn cmd_strong_doubles_inner_quotes() {
        let arg = strong(r#"C:\a "b"\c.jvs"#);
        assert_eq!(render_arg(&arg, ShellFlavor::Cmd), r#""C:\a ""b""\c.jvs""#);
    }

    #[test]
    fn posix_weak_leaves_dollar_for_expansion() {
        let arg = quoted("$HOME/a \"b\"", ShellQuoting::Weak);
        assert_eq!(render_arg(&arg, ShellFlavor::Posix), r#""$HOME/a \"b\"""#);
    }

    #[test]
    fn posix_escape_backslashes_specials() {
        let arg = quoted("a b&c", ShellQuoting::Escape);
        assert_eq!(render_arg(&arg, ShellFlavor::Posix), r"a\ b\&c");
        assert_eq!(
            render_arg(&quoted("", ShellQuoting::Escape), ShellFlavor::Posix),
            "''"
        );
    }

    #[test]
    fn command_line_leaves_plain_words_alone() {
        let args = vec![
            TaskArg::from("-jar"),
            strong("/opt/java's cool/javascool-light.jar"),
            TaskArg::from("compile"),
            strong("/tmp/My Prog.jvs"),
        ];
        assert_eq!(
            render_command_line("java", &args, ShellFlavor::Posix),
            r"java -jar '/opt/java'\''s cool/javascool-light.jar' compile '/tmp/My Prog.jvs'"
        );
    }

    #[test]
    fn run_text_uses_double_quotes() {
        assert_eq!(
            run_command_text("/tmp/My App.jar"),
            r#"java -jar "/tmp/My App.jar""#
        );
    }
}
