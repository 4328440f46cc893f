use std::{iter::Enumerate, slice, str::Lines};

use log::debug;
use nom::{
    branch::alt,
    bytes::complete::{is_a, tag, take_till1},
    character::{
        complete::{digit1, multispace0},
        is_digit,
    },
    combinator::{all_consuming, map, map_res, verify},
    multi::many1,
    sequence::delimited,
    IResult,
};

use crate::ast::{Command::*, Segment::*, *};
use crate::error::{ParseError, ParseErrorKind};

fn integer(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |c: &str| c.parse())(input)
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((
        map(tag("constant"), |_| Constant),
        map(tag("local"), |_| Local),
        map(tag("static"), |_| Static),
        map(tag("argument"), |_| Argument),
        map(tag("this"), |_| This),
        map(tag("that"), |_| That),
        map(tag("pointer"), |_| Pointer),
        map(tag("temp"), |_| Temp),
    ))(input)
}

fn prim(input: &str) -> IResult<&str, Command> {
    alt((
        map(tag("add"), |_| Add),
        map(tag("sub"), |_| Sub),
        map(tag("neg"), |_| Neg),
        map(tag("eq"), |_| Eq),
        map(tag("gt"), |_| Gt),
        map(tag("lt"), |_| Lt),
        map(tag("and"), |_| And),
        map(tag("or"), |_| Or),
        map(tag("not"), |_| Not),
    ))(input)
}

fn symbol(input: &str) -> IResult<&str, String> {
    map(
        verify(
            is_a("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_.$:0123456789"),
            |c: &str| !is_digit(c.as_bytes()[0]),
        ),
        |sym: &str| sym.to_string(),
    )(input)
}

fn tokens(input: &str) -> IResult<&str, Vec<&str>> {
    many1(delimited(
        multispace0,
        take_till1(|c: char| c.is_whitespace()),
        multispace0,
    ))(input)
}

/// Positional operands following a keyword.
struct Operands<'t, 'a> {
    keyword: &'static str,
    rest: slice::Iter<'t, &'a str>,
}

impl<'t, 'a> Operands<'t, 'a> {
    fn next(&mut self, operand: &'static str) -> Result<&'a str, ParseErrorKind> {
        self.rest.next().copied().ok_or(ParseErrorKind::MissingOperand {
            keyword: self.keyword,
            operand,
        })
    }

    fn segment(&mut self) -> Result<Segment, ParseErrorKind> {
        let tok = self.next("segment")?;
        all_consuming(segment)(tok)
            .map(|(_, seg)| seg)
            .map_err(|_| ParseErrorKind::InvalidSegment(tok.to_string()))
    }

    fn index(&mut self, operand: &'static str) -> Result<u16, ParseErrorKind> {
        let tok = self.next(operand)?;
        all_consuming(integer)(tok)
            .map(|(_, n)| n)
            .map_err(|_| ParseErrorKind::InvalidIndex(tok.to_string()))
    }

    fn symbol(&mut self, operand: &'static str) -> Result<String, ParseErrorKind> {
        let tok = self.next(operand)?;
        all_consuming(symbol)(tok)
            .map(|(_, sym)| sym)
            .map_err(|_| ParseErrorKind::InvalidSymbol(tok.to_string()))
    }

    fn finish(self, command: Command) -> Result<Command, ParseErrorKind> {
        let extra: Vec<&str> = self.rest.copied().collect();
        if extra.is_empty() {
            Ok(command)
        } else {
            Err(ParseErrorKind::ExtraOperands(extra.join(" ")))
        }
    }
}

fn segment_access(
    ops: &mut Operands,
    make: fn(Segment, u16) -> Command,
) -> Result<Command, ParseErrorKind> {
    let segment = ops.segment()?;
    let index = ops.index("index")?;
    if let Some(max) = segment.max_index() {
        if index > max {
            return Err(ParseErrorKind::IndexOutOfRange { segment, index, max });
        }
    }
    Ok(make(segment, index))
}

/// Decode one comment-stripped, non-empty line. `Ok(None)` means the leading
/// token is not a VM keyword and the line is skipped.
fn parse_line(line: &str) -> Result<Option<Command>, ParseErrorKind> {
    let words = match tokens(line) {
        Ok((_, words)) => words,
        Err(_) => return Ok(None),
    };
    let (first, rest) = match words.split_first() {
        Some(split) => split,
        None => return Ok(None),
    };

    let keyword = match *first {
        "push" => "push",
        "pop" => "pop",
        "label" => "label",
        "goto" => "goto",
        "if-goto" => "if-goto",
        "function" => "function",
        "call" => "call",
        "return" => "return",
        other => {
            return match all_consuming(prim)(other) {
                Ok((_, command)) => {
                    let ops = Operands { keyword: "arithmetic", rest: rest.iter() };
                    ops.finish(command).map(Some)
                }
                Err(_) => Ok(None),
            }
        }
    };

    let mut ops = Operands { keyword, rest: rest.iter() };
    let command = match keyword {
        "push" => segment_access(&mut ops, Push)?,
        "pop" => {
            let command = segment_access(&mut ops, Pop)?;
            if let Pop(Constant, _) = command {
                return Err(ParseErrorKind::PopConstant);
            }
            command
        }
        "label" => Label(ops.symbol("label name")?),
        "goto" => Goto(ops.symbol("label name")?),
        "if-goto" => IfGoto(ops.symbol("label name")?),
        "function" => {
            let name = ops.symbol("function name")?;
            Function(name, ops.index("local count")?)
        }
        "call" => {
            let name = ops.symbol("function name")?;
            Call(name, ops.index("argument count")?)
        }
        _ => Return,
    };
    ops.finish(command).map(Some)
}

/// Lazily decoded commands of one VM source.
pub struct Commands<'a> {
    lines: Enumerate<Lines<'a>>,
}

impl<'a> Iterator for Commands<'a> {
    type Item = Result<Command, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        for (number, raw) in self.lines.by_ref() {
            let line = raw.split_once("//").map(|(s, _)| s).unwrap_or(raw).trim();
            if line.is_empty() {
                continue;
            }

            match parse_line(line) {
                Ok(Some(command)) => return Some(Ok(command)),
                Ok(None) => debug!("line {}: skipping unrecognized `{}`", number + 1, line),
                Err(kind) => {
                    return Some(Err(ParseError {
                        line: number + 1,
                        text: line.to_string(),
                        kind,
                    }))
                }
            }
        }
        None
    }
}

pub fn parse(input: &str) -> Commands<'_> {
    Commands {
        lines: input.lines().enumerate(),
    }
}
