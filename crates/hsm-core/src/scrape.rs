// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Progress fractions scraped from external tool output.
//!
//! Each parser looks at one output line and returns a fraction in `[0, 1]`
//! when the line carries one. Anything unrecognised is `None`, never an error.

/// Extracts a completion fraction from one line of tool output.
pub trait ProgressParser: Send + Sync {
    fn parse(&self, line: &str) -> Option<f64>;
}

/// `NN%` or `NN.N%` as a fraction.
fn percent_before(token: &str) -> Option<f64> {
    let number = token.strip_suffix('%')?;
    let value: f64 = number.parse().ok()?;
    (0.0..=100.0).contains(&value).then_some(value / 100.0)
}

/// First whitespace-separated `NN%` token in the line.
fn first_percent(line: &str) -> Option<f64> {
    line.split(|c: char| c.is_whitespace() || c == '[' || c == ']' || c == '(' || c == ')')
        .find_map(percent_before)
}

/// wget's `--progress=dot` and bar output: `  1200K .......... 45% 1.2M 3s`
/// or `file.zip  45%[=====>     ]  12.3M  1.1MB/s`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WgetParser;

impl ProgressParser for WgetParser {
    fn parse(&self, line: &str) -> Option<f64> {
        line.split_whitespace().find_map(|tok| {
            let tok = tok.split('[').next().unwrap_or(tok);
            percent_before(tok)
        })
    }
}

/// curl's progress meter; the first column is the total percentage:
/// `  45  120M   45 54.1M    0     0  10.2M      0  0:00:11 ...`
/// or the `--progress-bar` form `####### 45.2%`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurlParser;

impl ProgressParser for CurlParser {
    fn parse(&self, line: &str) -> Option<f64> {
        if let Some(p) = line.split_whitespace().last().and_then(percent_before) {
            return Some(p);
        }
        let mut cols = line.split_whitespace();
        let first = cols.next()?;
        // A meter row has a numeric first column followed by a size column
        let size = cols.next()?;
        if !size.chars().next()?.is_ascii_digit() {
            return None;
        }
        let value: f64 = first.parse().ok()?;
        (0.0..=100.0).contains(&value).then_some(value / 100.0)
    }
}

/// rsync `--info=progress2`: `  1,234,567  45%   10.00MB/s    0:00:05`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RsyncParser;

impl ProgressParser for RsyncParser {
    fn parse(&self, line: &str) -> Option<f64> {
        let mut cols = line.split_whitespace();
        let bytes = cols.next()?;
        if !bytes.chars().all(|c| c.is_ascii_digit() || c == ',') {
            return None;
        }
        percent_before(cols.next()?)
    }
}

/// Any line containing an `NN%` token.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericParser;

impl ProgressParser for GenericParser {
    fn parse(&self, line: &str) -> Option<f64> {
        first_percent(line)
    }
}

/// Tries each parser in order.
pub struct ParserChain(Vec<Box<dyn ProgressParser>>);

impl ParserChain {
    pub fn new(parsers: Vec<Box<dyn ProgressParser>>) -> Self {
        Self(parsers)
    }
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(RsyncParser),
            Box::new(WgetParser),
            Box::new(CurlParser),
            Box::new(GenericParser),
        ])
    }
}

impl ProgressParser for ParserChain {
    fn parse(&self, line: &str) -> Option<f64> {
        self.0.iter().find_map(|p| p.parse(line))
    }
}
