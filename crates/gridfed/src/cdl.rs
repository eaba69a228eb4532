// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Structural metadata from netCDF CDL text (`ncdump` output)
//!
//! The header (`dimensions:` and `variables:`, with attributes) is parsed in
//! full. In the `data:` section only the statement for the concatenation
//! coordinate is tokenized; every other statement is skipped by scanning for
//! its terminating `;`, so bulk payload is never converted.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{FederationError, Result};
use crate::frequency::SAMPLE_SIZE;
use crate::metadata::{ArrayMetadata, Dims, PerFileMetadata};
use crate::registry::CoordRange;
use crate::value::{AttrValue, Attrs};

const PUNCT: &[char] = &['=', ';', ',', '(', ')', ':', '{', '}'];

/// dtype name for a CDL type keyword
fn dtype_name(cdl_type: &str) -> Option<&'static str> {
    Some(match cdl_type {
        "double" => "float64",
        "float" | "real" => "float32",
        "int" | "long" => "int32",
        "short" => "int16",
        "byte" => "int8",
        "ubyte" => "uint8",
        "ushort" => "uint16",
        "uint" => "uint32",
        "int64" => "int64",
        "uint64" => "uint64",
        "char" => "S1",
        "string" => "str",
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Str(String),
    Punct(char),
    Comment(&'a str),
}

#[derive(Clone)]
struct Lexer<'a> {
    source_id: &'a str,
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(source_id: &'a str, src: &'a str) -> Self {
        Self { source_id, src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: impl AsRef<str>) -> FederationError {
        let line = self.src[..self.pos].matches('\n').count() + 1;
        FederationError::parse(self.source_id, format!("{} at line {line}", message.as_ref()))
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn skip_trivia(&mut self) {
        loop {
            self.skip_whitespace();
            match self.rest().strip_prefix("//") {
                Some(body) => self.pos += 2 + body.find('\n').unwrap_or(body.len()),
                None => return,
            }
        }
    }

    fn next_raw(&mut self) -> Result<Option<Token<'a>>> {
        self.skip_whitespace();
        let rest = self.rest();
        let Some(c) = rest.chars().next() else {
            return Ok(None);
        };
        if let Some(body) = rest.strip_prefix("//") {
            let end = body.find('\n').unwrap_or(body.len());
            self.pos += 2 + end;
            return Ok(Some(Token::Comment(&body[..end])));
        }
        if c == '"' {
            return self.string().map(Some);
        }
        if PUNCT.contains(&c) {
            self.pos += 1;
            return Ok(Some(Token::Punct(c)));
        }
        let end = rest
            .find(|ch: char| ch.is_whitespace() || ch == '"' || PUNCT.contains(&ch))
            .unwrap_or(rest.len());
        self.pos += end;
        Ok(Some(Token::Word(&rest[..end])))
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            match self.next_raw()? {
                Some(Token::Comment(_)) => continue,
                other => return Ok(other),
            }
        }
    }

    fn expect(&mut self, expected: &Token<'_>, what: &str) -> Result<()> {
        match self.next_token()? {
            Some(ref tok) if tok == expected => Ok(()),
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn string(&mut self) -> Result<Token<'a>> {
        let body = &self.rest()[1..];
        let mut out = String::new();
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 2;
                    return Ok(Token::Str(out));
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                _ => out.push(c),
            }
        }
        Err(self.error("unterminated string"))
    }

    /// Tokens from `first` up to, not including, the next `;`
    fn statement(&mut self, first: Token<'a>) -> Result<Vec<Token<'a>>> {
        let mut tokens = vec![first];
        loop {
            match self.next_token()? {
                Some(Token::Punct(';')) => return Ok(tokens),
                Some(tok) => tokens.push(tok),
                None => return Err(self.error("missing ';'")),
            }
        }
    }

    /// A section keyword is followed by ':' and then whitespace, unlike
    /// `var:attr`
    fn at_section_colon(&self) -> bool {
        let mut rest = self.rest().chars();
        rest.next() == Some(':') && rest.next().is_none_or(char::is_whitespace)
    }

    /// Move past the next `;` outside a string, without tokenizing
    fn skip_statement(&mut self) -> Result<()> {
        let bytes = self.src.as_bytes();
        let mut i = self.pos;
        let mut in_string = false;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if in_string => i += 1,
                b'"' => in_string = !in_string,
                b';' if !in_string => {
                    self.pos = i + 1;
                    return Ok(());
                }
                b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        self.pos = bytes.len();
        Err(self.error("missing ';'"))
    }
}

/// CDL numeric literal, with optional type suffix
fn parse_number(word: &str) -> Option<AttrValue> {
    let lower = word.to_ascii_lowercase();
    let unsigned = lower.trim_start_matches(['-', '+']);
    let sign = if lower.starts_with('-') { -1.0 } else { 1.0 };
    match unsigned {
        "nan" | "nanf" => return Some(AttrValue::Float(f64::NAN)),
        "infinity" | "infinityf" | "inf" | "inff" => {
            return Some(AttrValue::Float(sign * f64::INFINITY));
        }
        _ => {}
    }

    let body = lower.trim_end_matches(['f', 'd', 's', 'b', 'l', 'u']);
    let suffix = &lower[body.len()..];
    if suffix != "f" && suffix != "d" {
        if let Ok(i) = body.parse::<i64>() {
            return Some(AttrValue::Int(i));
        }
    }
    body.parse::<f64>().ok().map(AttrValue::Float)
}

#[derive(Debug)]
struct VarDecl {
    dims: Vec<String>,
    dtype: &'static str,
    attrs: Attrs,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Dimensions,
    Variables,
}

/// Leading values and extent of the concatenation coordinate
#[derive(Debug)]
struct CoordValues {
    first: f64,
    last: f64,
    count: usize,
    sample: Vec<f64>,
}

struct CdlParser<'a> {
    lx: Lexer<'a>,
    concat_dim: &'a str,
    dims: Dims,
    unlimited: BTreeSet<String>,
    vars: BTreeMap<String, VarDecl>,
    global: Attrs,
}

impl<'a> CdlParser<'a> {
    fn run(mut self) -> Result<PerFileMetadata> {
        self.lx.expect(&Token::Word("netcdf"), "'netcdf'")?;
        match self.lx.next_token()? {
            Some(Token::Word(_)) => {}
            _ => return Err(self.lx.error("expected dataset name")),
        }
        self.lx.expect(&Token::Punct('{'), "'{'")?;

        let mut section = None;
        let mut values = None;
        loop {
            let tok = self
                .lx
                .next_token()?
                .ok_or_else(|| self.lx.error("missing closing '}'"))?;
            match tok {
                Token::Punct('}') => break,
                Token::Word(word) if self.lx.at_section_colon() => {
                    self.lx.pos += 1;
                    match word {
                        "dimensions" => section = Some(Section::Dimensions),
                        "variables" => section = Some(Section::Variables),
                        "data" => {
                            values = self.scan_data()?;
                            break;
                        }
                        other => {
                            return Err(self.lx.error(format!("unsupported section '{other}'")));
                        }
                    }
                }
                first => {
                    let stmt = self.lx.statement(first)?;
                    match section {
                        Some(Section::Dimensions) => self.dimensions(&stmt)?,
                        Some(Section::Variables) => self.variable_statement(&stmt)?,
                        None => return Err(self.lx.error("statement outside a section")),
                    }
                }
            }
        }

        self.finish(values)
    }

    fn dimensions(&mut self, stmt: &[Token<'a>]) -> Result<()> {
        // ncdump reports the current length of an unlimited dimension in a
        // trailing "// (N currently)" comment
        let current = match self.lx.clone().next_raw()? {
            Some(Token::Comment(text)) => currently(text),
            _ => None,
        };

        for decl in stmt.split(|t| *t == Token::Punct(',')) {
            match decl {
                [Token::Word(name), Token::Punct('='), Token::Word("UNLIMITED")] => {
                    self.unlimited.insert(name.to_string());
                    self.dims.insert(name.to_string(), current.unwrap_or(0));
                }
                [Token::Word(name), Token::Punct('='), Token::Word(size)] => {
                    let size = size
                        .parse()
                        .map_err(|_| self.lx.error(format!("invalid size '{size}' for dimension '{name}'")))?;
                    self.dims.insert(name.to_string(), size);
                }
                _ => return Err(self.lx.error("malformed dimension declaration")),
            }
        }
        Ok(())
    }

    fn variable_statement(&mut self, stmt: &[Token<'a>]) -> Result<()> {
        match stmt {
            [Token::Punct(':'), Token::Word(attr), Token::Punct('='), values @ ..] => {
                let value = self.attr_value(values)?;
                self.global.insert(attr.to_string(), value);
            }
            [Token::Word(ty), Token::Punct(':'), Token::Word(attr), Token::Punct('='), values @ ..]
                if dtype_name(ty).is_some() =>
            {
                let value = self.attr_value(values)?;
                self.global.insert(attr.to_string(), value);
            }
            [Token::Word(var), Token::Punct(':'), Token::Word(attr), Token::Punct('='), values @ ..]
            | [Token::Word(_), Token::Word(var), Token::Punct(':'), Token::Word(attr), Token::Punct('='), values @ ..] => {
                let value = self.attr_value(values)?;
                let decl = self
                    .vars
                    .get_mut(*var)
                    .ok_or_else(|| self.lx.error(format!("attribute for undeclared variable '{var}'")))?;
                decl.attrs.insert(attr.to_string(), value);
            }
            [Token::Word(ty), Token::Word(name)] => self.declare(ty, name, Vec::new())?,
            [Token::Word(ty), Token::Word(name), Token::Punct('('), inner @ .., Token::Punct(')')] => {
                let dims = inner
                    .split(|t| *t == Token::Punct(','))
                    .map(|part| match part {
                        [Token::Word(d)] => Ok(d.to_string()),
                        _ => Err(self.lx.error(format!("malformed dimensions for '{name}'"))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.declare(ty, name, dims)?;
            }
            _ => return Err(self.lx.error("malformed variable statement")),
        }
        Ok(())
    }

    fn declare(&mut self, ty: &str, name: &str, dims: Vec<String>) -> Result<()> {
        let dtype = dtype_name(ty).ok_or_else(|| self.lx.error(format!("unknown type '{ty}'")))?;
        self.vars.insert(
            name.to_string(),
            VarDecl {
                dims,
                dtype,
                attrs: Attrs::new(),
            },
        );
        Ok(())
    }

    fn attr_value(&self, tokens: &[Token<'a>]) -> Result<AttrValue> {
        let items: Vec<&Token<'a>> = tokens.iter().filter(|t| **t != Token::Punct(',')).collect();
        if items.is_empty() {
            return Err(self.lx.error("attribute without a value"));
        }

        // "abc", "def" is one string split across lines
        if items.iter().all(|t| matches!(t, Token::Str(_))) {
            let joined = items
                .iter()
                .filter_map(|t| match t {
                    Token::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect::<String>();
            return Ok(AttrValue::Text(joined));
        }

        let mut parsed = Vec::with_capacity(items.len());
        for tok in items {
            let value = match tok {
                Token::Word(w) => parse_number(w).unwrap_or_else(|| AttrValue::Text(w.to_string())),
                Token::Str(s) => AttrValue::Text(s.clone()),
                _ => return Err(self.lx.error("unexpected token in attribute value")),
            };
            parsed.push(value);
        }
        Ok(match parsed.len() {
            1 => parsed.remove(0),
            _ => AttrValue::List(parsed),
        })
    }

    /// Find the concatenation coordinate's statement in `data:`
    fn scan_data(&mut self) -> Result<Option<CoordValues>> {
        loop {
            self.lx.skip_trivia();
            let rest = self.lx.rest();
            if rest.is_empty() || rest.starts_with('}') {
                return Ok(None);
            }
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '=')
                .unwrap_or(rest.len());
            let name = &rest[..end];
            self.lx.pos += end;
            self.lx.expect(&Token::Punct('='), "'=' in data section")?;
            if name == self.concat_dim {
                return self.coordinate_values().map(Some);
            }
            self.lx.skip_statement()?;
        }
    }

    fn coordinate_values(&mut self) -> Result<CoordValues> {
        let mut values = CoordValues {
            first: f64::NAN,
            last: f64::NAN,
            count: 0,
            sample: Vec::with_capacity(SAMPLE_SIZE),
        };
        loop {
            let value = match self.lx.next_token()? {
                Some(Token::Punct(';')) => return Ok(values),
                Some(Token::Punct(',')) => continue,
                Some(Token::Word("_")) => f64::NAN,
                Some(Token::Word(w)) => parse_number(w)
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| self.lx.error(format!("non-numeric value '{w}' for '{}'", self.concat_dim)))?,
                Some(_) => return Err(self.lx.error(format!("non-numeric value for '{}'", self.concat_dim))),
                None => return Err(self.lx.error("missing ';'")),
            };
            if values.count == 0 {
                values.first = value;
            }
            values.last = value;
            values.count += 1;
            if values.sample.len() < SAMPLE_SIZE {
                values.sample.push(value);
            }
        }
    }

    fn finish(mut self, values: Option<CoordValues>) -> Result<PerFileMetadata> {
        let source = self.lx.source_id.to_string();
        if !self.dims.contains_key(self.concat_dim) {
            return Err(FederationError::MissingDimension {
                source_id: source,
                dim: self.concat_dim.to_string(),
            });
        }
        let values = values
            .filter(|v| v.count > 0)
            .ok_or_else(|| FederationError::MissingCoordinateValues {
                source_id: source.clone(),
                coord: self.concat_dim.to_string(),
            })?;
        if self.unlimited.contains(self.concat_dim) && self.dims.get(self.concat_dim) == Some(&0) {
            self.dims.insert(self.concat_dim.to_string(), values.count);
        }

        let mut coord_names: BTreeSet<String> = self
            .vars
            .iter()
            .filter(|(name, v)| v.dims.len() == 1 && &v.dims[0] == *name)
            .map(|(name, _)| name.clone())
            .collect();
        for decl in self.vars.values() {
            if let Some(listed) = decl.attrs.get("coordinates").and_then(AttrValue::as_str) {
                coord_names.extend(
                    listed
                        .split_whitespace()
                        .filter(|n| self.vars.contains_key(*n))
                        .map(str::to_string),
                );
            }
        }

        let mut coords = BTreeMap::new();
        let mut variables = BTreeMap::new();
        for (name, decl) in self.vars {
            let mut array = ArrayMetadata::with_dims(decl.dims, decl.dtype, &self.dims);
            array.attrs = decl.attrs;
            if coord_names.contains(&name) {
                coords.insert(name, array);
            } else {
                variables.insert(name, array);
            }
        }

        Ok(PerFileMetadata {
            source,
            dims: self.dims,
            coords,
            variables,
            attrs: self.global,
            coord_range: CoordRange::new(values.first, values.last),
            coord_sample: values.sample,
        })
    }
}

/// `N` from a "(N currently)" comment
fn currently(comment: &str) -> Option<usize> {
    let open = comment.find('(')?;
    let inner = &comment[open + 1..];
    let close = inner.find(')')?;
    let mut words = inner[..close].split_whitespace();
    let n = words.next()?.parse().ok()?;
    (words.next() == Some("currently")).then_some(n)
}

/// Parse CDL text into per-source metadata along `concat_dim`
pub fn parse_cdl(source_id: &str, text: &str, concat_dim: &str) -> Result<PerFileMetadata> {
    CdlParser {
        lx: Lexer::new(source_id, text),
        concat_dim,
        dims: Dims::new(),
        unlimited: BTreeSet::new(),
        vars: BTreeMap::new(),
        global: Attrs::new(),
    }
    .run()
}
