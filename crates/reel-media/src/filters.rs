//! Typed FFmpeg filter-graph builder.
//!
//! Stages describe filters as data (`Filter` -> `FilterChain` -> `FilterGraph`)
//! and only the command builder turns them into FFmpeg's textual syntax.
//! Values are escaped for both parsing levels FFmpeg applies: the option
//! level (`:` separated `key=value` pairs) and the graph level (`,` `;` `[` `]`).

use std::fmt;

/// A single filter with its arguments, e.g. `eq=brightness=0.1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Positional(String),
    Named(String, String),
}

impl Filter {
    /// Create a filter with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add a `key=value` argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.args.push(FilterArg::Named(key.into(), value.to_string()));
        self
    }

    /// Add a positional argument.
    pub fn value(mut self, value: impl fmt::Display) -> Self {
        self.args.push(FilterArg::Positional(value.to_string()));
        self
    }

    /// Filter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unescaped value of a named argument.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            FilterArg::Named(k, v) if k == key => Some(v.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            match arg {
                FilterArg::Positional(v) => f.write_str(&escape_value(v))?,
                FilterArg::Named(k, v) => write!(f, "{}={}", k, escape_value(v))?,
            }
        }
        Ok(())
    }
}

/// A linear chain of filters with optional input/output pad labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    inputs: Vec<String>,
    filters: Vec<Filter>,
    outputs: Vec<String>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input pad label (without brackets), e.g. `0:v`.
    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.inputs.push(label.into());
        self
    }

    /// Append a filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append several filters.
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Add an output pad label (without brackets).
    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn steps(&self) -> &[Filter] {
        &self.filters
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "[{}]", label)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        for label in &self.outputs {
            write!(f, "[{}]", label)?;
        }
        Ok(())
    }
}

/// A complete graph: chains separated by `;`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chains.push(chain);
        self
    }

    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    /// All filters in graph order.
    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.chains.iter().flat_map(|c| c.steps().iter())
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}

/// Escape a value for the option parser and then for the graph parser.
pub fn escape_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}

/// Format a number for filter arguments without trailing zeros.
pub fn fmt_num(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
