use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A build command to be executed by a [`BuildExecutor`](super::BuildExecutor).
///
/// Immutable once built: construct via [`BuildCommandBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl BuildCommand {
    /// Render the command for diagnostics.
    ///
    /// Arguments containing whitespace are wrapped in double quotes so they
    /// stay distinguishable from separate arguments; embedded double quotes
    /// are backslash-escaped. An argument with an unbalanced quote renders
    /// best-effort: the escaped form is readable but is not guaranteed to
    /// be shell-reparseable.
    pub fn to_display_string(&self) -> String {
        let mut rendered = Vec::with_capacity(self.args.len() + 1);
        rendered.push(quote_arg(&self.program));
        rendered.extend(self.args.iter().map(|a| quote_arg(a)));
        rendered.join(" ")
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty() || arg.chars().any(|c| c.is_whitespace());
    let has_quote = arg.contains('"');

    if !needs_quotes && !has_quote {
        return arg.to_string();
    }

    let escaped = arg.replace('"', "\\\"");
    if needs_quotes {
        format!("\"{}\"", escaped)
    } else {
        escaped
    }
}

pub struct BuildCommandBuilder {
    command: BuildCommand,
}

impl BuildCommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            command: BuildCommand {
                program: program.to_string(),
                args: Vec::new(),
                env: HashMap::new(),
                working_dir: None,
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            self.command
                .env
                .insert(key.as_ref().to_string(), value.as_ref().to_string());
        }
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn build(self) -> BuildCommand {
        self.command
    }
}
