// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

use tiny_skia::{FillRule, Point};

/// A lexical unit of abbreviated path data.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PathToken {
    Number(f32),
    Comma,
    Command(u8),
    EndOfInput,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum PathError {
    UnexpectedChar(usize),
    InvalidNumber(usize),
    UnexpectedToken(PathToken),
    UnknownCommand(char),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PathError::UnexpectedChar(pos) => write!(f, "unexpected character at {}", pos),
            PathError::InvalidNumber(pos) => write!(f, "invalid number at {}", pos),
            PathError::UnexpectedToken(token) => write!(f, "unexpected token {:?}", token),
            PathError::UnknownCommand(c) => write!(f, "unknown command '{}'", c),
        }
    }
}

/// A lazy tokenizer of abbreviated path data.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Tokenizer { text, pos: 0 }
    }

    pub fn next_token(&mut self) -> Result<PathToken, PathError> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }

        let c = match bytes.get(self.pos) {
            Some(c) => *c,
            None => return Ok(PathToken::EndOfInput),
        };

        if c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.') {
            let start = self.pos;
            while let Some(&c) = bytes.get(self.pos) {
                let is_exponent = matches!(c, b'e' | b'E') && self.pos > start;
                if c.is_ascii_whitespace() || c == b',' || (c.is_ascii_alphabetic() && !is_exponent)
                {
                    break;
                }
                self.pos += 1;
            }

            let text = &self.text[start..self.pos];
            match text.parse::<f32>() {
                Ok(n) if n.is_finite() => Ok(PathToken::Number(n)),
                _ => Err(PathError::InvalidNumber(start)),
            }
        } else if c == b',' {
            self.pos += 1;
            Ok(PathToken::Comma)
        } else if c.is_ascii_alphabetic() {
            self.pos += 1;
            Ok(PathToken::Command(c))
        } else {
            Err(PathError::UnexpectedChar(self.pos))
        }
    }
}

/// A path construction command with absolute coordinates.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PathSegment {
    SetFillRule(FillRule),
    MoveTo {
        x: f32,
        y: f32,
    },
    LineTo {
        x: f32,
        y: f32,
    },
    CubicTo {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        x: f32,
        y: f32,
    },
    QuadTo {
        x1: f32,
        y1: f32,
        x: f32,
        y: f32,
    },
    ClosePath,
}

/// A parsed abbreviated path geometry (the `Data` attribute of a `Path`).
#[derive(Clone, Default, Debug)]
pub struct PathData {
    segments: Vec<PathSegment>,
}

impl PathData {
    /// Parses abbreviated path data.
    ///
    /// Never fails. Parsing stops at the first error and everything
    /// parsed before it is kept.
    pub fn parse(text: &str) -> Self {
        let mut parser = Parser {
            tokens: Tokenizer::new(text),
            token: PathToken::EndOfInput,
            error: None,
            current: Point::zero(),
            start: Point::zero(),
            prev_cmd: None,
            prev_ctrl: Point::zero(),
            segments: Vec::new(),
        };

        if let Err(e) = parser.parse() {
            log::warn!("Failed to parse path data '{}' cause {}.", text, e);
        }

        PathData {
            segments: parser.segments,
        }
    }

    /// Returns all segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the fill rule set by the `F` command.
    ///
    /// Default: even-odd
    pub fn fill_rule(&self) -> FillRule {
        self.segments
            .iter()
            .rev()
            .find_map(|seg| match seg {
                PathSegment::SetFillRule(rule) => Some(*rule),
                _ => None,
            })
            .unwrap_or(FillRule::EvenOdd)
    }

    /// Splits geometry segments into subpaths.
    ///
    /// Each subpath starts with a `MoveTo`, except the first one when
    /// the data begins with a drawing command.
    pub fn subpaths(&self) -> Vec<&[PathSegment]> {
        let mut list = Vec::new();
        let mut start = None;
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::SetFillRule(_) => {
                    if let Some(s) = start.take() {
                        list.push(&self.segments[s..i]);
                    }
                }
                PathSegment::MoveTo { .. } => {
                    if let Some(s) = start {
                        list.push(&self.segments[s..i]);
                    }
                    start = Some(i);
                }
                _ => {
                    if start.is_none() {
                        start = Some(i);
                    }
                }
            }
        }

        if let Some(s) = start {
            list.push(&self.segments[s..]);
        }

        list
    }

    /// Converts segments into a `tiny_skia::Path`.
    ///
    /// Returns `None` when the path is empty or has a zero-sized bbox.
    pub fn to_path(&self) -> Option<tiny_skia::Path> {
        let mut builder = tiny_skia::PathBuilder::new();
        for seg in &self.segments {
            match *seg {
                PathSegment::SetFillRule(_) => {}
                PathSegment::MoveTo { x, y } => builder.move_to(x, y),
                PathSegment::LineTo { x, y } => builder.line_to(x, y),
                PathSegment::CubicTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => builder.cubic_to(x1, y1, x2, y2, x, y),
                PathSegment::QuadTo { x1, y1, x, y } => builder.quad_to(x1, y1, x, y),
                PathSegment::ClosePath => builder.close(),
            }
        }

        builder.finish()
    }
}

struct Parser<'a> {
    tokens: Tokenizer<'a>,
    // Single token lookahead.
    token: PathToken,
    // A tokenizer error hidden behind the lookahead.
    error: Option<PathError>,
    current: Point,
    start: Point,
    prev_cmd: Option<u8>,
    prev_ctrl: Point,
    segments: Vec<PathSegment>,
}

impl Parser<'_> {
    fn advance(&mut self) {
        self.token = match self.tokens.next_token() {
            Ok(token) => token,
            Err(e) => {
                self.error = Some(e);
                PathToken::EndOfInput
            }
        };
    }

    fn unexpected(&self) -> PathError {
        self.error.unwrap_or(PathError::UnexpectedToken(self.token))
    }

    fn number(&mut self) -> Result<f32, PathError> {
        match self.token {
            PathToken::Number(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn has_number(&self) -> bool {
        matches!(self.token, PathToken::Number(_))
    }

    // `number [,] number`
    fn point(&mut self, origin: Option<Point>) -> Result<Point, PathError> {
        let x = self.number()?;
        if self.token == PathToken::Comma {
            self.advance();
        }
        let y = self.number()?;

        Ok(match origin {
            Some(o) => Point::from_xy(o.x + x, o.y + y),
            None => Point::from_xy(x, y),
        })
    }

    fn parse(&mut self) -> Result<(), PathError> {
        self.advance();

        loop {
            let cmd = match self.token {
                PathToken::Command(c) => c,
                PathToken::EndOfInput if self.error.is_none() => return Ok(()),
                _ => return Err(self.unexpected()),
            };
            self.advance();

            let is_relative = cmd.is_ascii_lowercase();
            let cmd = cmd.to_ascii_lowercase();
            self.command(cmd, is_relative)?;
            self.prev_cmd = Some(cmd);
        }
    }

    fn command(&mut self, cmd: u8, is_relative: bool) -> Result<(), PathError> {
        match cmd {
            b'f' => {
                let rule = self.number()?;
                if rule == 0.0 {
                    self.segments.push(PathSegment::SetFillRule(FillRule::EvenOdd));
                } else if rule == 1.0 {
                    self.segments.push(PathSegment::SetFillRule(FillRule::Winding));
                } else {
                    log::warn!("Invalid fill rule: {}.", rule);
                }
            }
            b'm' => {
                while self.has_number() {
                    let p = self.point(self.origin(is_relative))?;
                    self.segments.push(PathSegment::MoveTo { x: p.x, y: p.y });
                    self.current = p;
                    self.start = p;
                }
            }
            b'l' => {
                while self.has_number() {
                    let p = self.point(self.origin(is_relative))?;
                    self.line_to(p);
                }
            }
            b'h' => {
                while self.has_number() {
                    let mut x = self.number()?;
                    if is_relative {
                        x += self.current.x;
                    }
                    self.line_to(Point::from_xy(x, self.current.y));
                }
            }
            b'v' => {
                while self.has_number() {
                    let mut y = self.number()?;
                    if is_relative {
                        y += self.current.y;
                    }
                    self.line_to(Point::from_xy(self.current.x, y));
                }
            }
            b'c' => {
                while self.has_number() {
                    let p1 = self.point(self.origin(is_relative))?;
                    let p2 = self.point(anchor(is_relative, p1))?;
                    let p = self.point(anchor(is_relative, p2))?;
                    self.cubic_to(p1, p2, p);
                    self.prev_cmd = Some(b'c');
                }
            }
            b's' => {
                while self.has_number() {
                    let p1 = if matches!(self.prev_cmd, Some(b'c') | Some(b's')) {
                        Point::from_xy(
                            self.current.x * 2.0 - self.prev_ctrl.x,
                            self.current.y * 2.0 - self.prev_ctrl.y,
                        )
                    } else {
                        self.current
                    };

                    let p2 = self.point(self.origin(is_relative))?;
                    let p = self.point(anchor(is_relative, p2))?;
                    self.cubic_to(p1, p2, p);
                    self.prev_cmd = Some(b's');
                }
            }
            b'q' => {
                while self.has_number() {
                    let p1 = self.point(self.origin(is_relative))?;
                    let p = self.point(anchor(is_relative, p1))?;
                    self.segments.push(PathSegment::QuadTo {
                        x1: p1.x,
                        y1: p1.y,
                        x: p.x,
                        y: p.y,
                    });
                    self.current = p;
                }
            }
            b'a' => {
                // Arcs are parsed, but not drawn.
                while self.has_number() {
                    let origin = self.origin(is_relative);
                    let _size = self.point(None)?;
                    let _rotation = self.number()?;
                    let _large_arc = self.number()?;
                    let _sweep = self.number()?;
                    let _end = self.point(origin)?;
                }
                log::debug!("Arc segments are not supported.");
            }
            b'z' => {
                self.segments.push(PathSegment::ClosePath);
                self.current = self.start;
            }
            _ => return Err(PathError::UnknownCommand(cmd as char)),
        }

        Ok(())
    }

    fn origin(&self, is_relative: bool) -> Option<Point> {
        anchor(is_relative, self.current)
    }

    fn line_to(&mut self, p: Point) {
        self.segments.push(PathSegment::LineTo { x: p.x, y: p.y });
        self.current = p;
    }

    fn cubic_to(&mut self, p1: Point, p2: Point, p: Point) {
        self.segments.push(PathSegment::CubicTo {
            x1: p1.x,
            y1: p1.y,
            x2: p2.x,
            y2: p2.y,
            x: p.x,
            y: p.y,
        });
        self.prev_ctrl = p2;
        self.current = p;
    }
}

#[rustfmt::skip]
// Relative points are chained: each one is the reference for the next.
fn anchor(is_relative: bool, reference: Point) -> Option<Point> {
    if is_relative {
        Some(reference)
    } else {
        None
    }
}
