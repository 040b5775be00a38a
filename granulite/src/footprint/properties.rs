// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Reader for `footprints.properties` files
//!
//! Java properties syntax: `key=value`, `key:value` or `key value`, `#` and
//! `!` comment lines, backslash line continuation and backslash escapes
//! (`\t`, `\n`, `\r`, `\f`, `\uXXXX`). Later keys override earlier ones.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while_m_n},
    character::complete::{anychar, char, none_of, one_of},
    combinator::{all_consuming, cut, map, map_opt, opt},
    multi::{many0, many1},
    sequence::{preceded, tuple},
    IResult,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::error::{FootprintError, FootprintResult};

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn blanks(input: &str) -> IResult<&str, &str> {
    take_while(is_blank)(input)
}

fn unicode_escape(input: &str) -> IResult<&str, char> {
    preceded(
        char('u'),
        cut(map_opt(
            take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
            |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
        )),
    )(input)
}

fn escaped_char(input: &str) -> IResult<&str, char> {
    preceded(
        char('\\'),
        alt((
            unicode_escape,
            map(anychar, |c| match c {
                't' => '\t',
                'n' => '\n',
                'r' => '\r',
                'f' => '\x0c',
                other => other,
            }),
        )),
    )(input)
}

fn key(input: &str) -> IResult<&str, String> {
    map(many1(alt((escaped_char, none_of("=: \t\x0c\\")))), |chars| {
        chars.into_iter().collect()
    })(input)
}

fn separator(input: &str) -> IResult<&str, ()> {
    map(tuple((blanks, opt(one_of("=:")), blanks)), |_| ())(input)
}

fn value(input: &str) -> IResult<&str, String> {
    map(many0(alt((escaped_char, none_of("\\")))), |chars| {
        chars.into_iter().collect()
    })(input)
}

fn entry(input: &str) -> IResult<&str, (String, String)> {
    map(tuple((blanks, key, separator, value)), |(_, k, _, v)| (k, v))(input)
}

/// A line ends in a continuation when it has an odd run of trailing backslashes
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Fold physical lines into logical lines, tagged with their first line number
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let physical = match current {
            Some(_) => raw.trim_start_matches(is_blank),
            None => {
                let trimmed = raw.trim_start_matches(is_blank);
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed
            }
        };

        let (body, more) = if continues(physical) {
            (&physical[..physical.len() - 1], true)
        } else {
            (physical, false)
        };
        let (start, mut logical) = current.take().unwrap_or((line_no, String::new()));
        logical.push_str(body);
        if more {
            current = Some((start, logical));
        } else {
            lines.push((start, logical));
        }
    }
    if let Some(pending) = current {
        lines.push(pending);
    }
    lines
}

/// Parsed key/value pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn parse(text: &str) -> FootprintResult<Self> {
        let mut entries = BTreeMap::new();
        for (line, logical) in logical_lines(text) {
            let (_, (k, v)) = all_consuming(entry)(logical.as_str()).map_err(|e| {
                FootprintError::Properties {
                    line,
                    reason: match e {
                        nom::Err::Error(err) | nom::Err::Failure(err) => {
                            format!("unexpected input '{}'", err.input)
                        }
                        nom::Err::Incomplete(_) => "incomplete entry".to_string(),
                    },
                }
            })?;
            entries.insert(k, v);
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> FootprintResult<Self> {
        let text = fs::read_to_string(path).map_err(FootprintError::io(path))?;
        Self::parse(&text)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Non-empty trimmed value
    pub fn get_trimmed(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> FootprintResult<Option<bool>> {
        self.get_trimmed(key)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(FootprintError::Config(format!("{key}: expected true or false, got '{v}'"))),
            })
            .transpose()
    }

    pub fn get_f64(&self, key: &str) -> FootprintResult<Option<f64>> {
        self.get_trimmed(key)
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| FootprintError::Config(format!("{key}: '{v}' is not a number")))
            })
            .transpose()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
