//! JSON path resolution.
//!
//! Resolves JSONPath-style read queries like `res.body.events[*].id` against a
//! JSON tree. The grammar is closed; anything outside it is a parse error:
//!
//! ```text
//! path      := ["$"] [name] segment*
//! segment   := "." name | ".*" | ".." (name | "*" | bracket) | bracket
//! bracket   := "[" ( "*" | int | quoted | "?(" filter ")" ) "]"
//! filter    := and ("||" and)*
//! and       := unary ("&&" unary)*
//! unary     := "!" unary | "(" filter ")" | operand [cmp operand]
//! cmp       := "===" | "!==" | "==" | "!=" | "<" | "<=" | ">" | ">="
//! operand   := atom postfix*
//! atom      := "@" | "@property" | quoted | number | /regex/flags
//!            | true | false | null | undefined
//! postfix   := "." ident | "[" (quoted | int) "]"
//!            | "." method "(" [operand ("," operand)*] ")"
//! method    := startsWith | endsWith | includes | match | test
//!            | toLowerCase | toUpperCase
//! ```
//!
//! Inside filters `@` is the candidate child and `@property` its key.
//! Comparisons and truthiness follow JavaScript semantics.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Number, Value};

use crate::error::PathError;

/// A compiled read query.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Child(String),
    Index(i64),
    Wildcard,
    Filter(FilterExpr),
    Descendant(Box<Segment>),
}

impl JsonPath {
    pub fn parse(source: &str) -> Result<Self, PathError> {
        let segments = Parser::new(source).parse_path()?;
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All matches, in document order. Always a list, possibly empty.
    pub fn query<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                segment.apply(node, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Unwrapped result: `None` for no match, the value itself for exactly
    /// one match, an array of all matches otherwise.
    pub fn query_unwrapped(&self, root: &Value) -> Option<Value> {
        let mut matches = self.query(root);
        match matches.len() {
            0 => None,
            1 => matches.pop().cloned(),
            _ => Some(Value::Array(matches.into_iter().cloned().collect())),
        }
    }
}

impl TryFrom<String> for JsonPath {
    type Error = PathError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        let segments = Parser::new(&source).parse_path()?;
        Ok(Self { source, segments })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Segment {
    fn apply<'a>(&self, node: &'a Value, out: &mut Vec<&'a Value>) {
        match self {
            Segment::Child(name) => match node {
                Value::Object(obj) => out.extend(obj.get(name)),
                Value::Array(arr) => {
                    if let Ok(index) = name.parse::<usize>() {
                        out.extend(arr.get(index));
                    }
                }
                _ => {}
            },
            Segment::Index(index) => match node {
                Value::Array(arr) => out.extend(array_get(arr, *index)),
                Value::Object(obj) => out.extend(obj.get(&index.to_string())),
                _ => {}
            },
            Segment::Wildcard => match node {
                Value::Array(arr) => out.extend(arr.iter()),
                Value::Object(obj) => out.extend(obj.values()),
                _ => {}
            },
            Segment::Filter(expr) => match node {
                Value::Array(arr) => {
                    for (i, child) in arr.iter().enumerate() {
                        if expr.matches(child, &Value::from(i)) {
                            out.push(child);
                        }
                    }
                }
                Value::Object(obj) => {
                    for (key, child) in obj {
                        if expr.matches(child, &Value::String(key.clone())) {
                            out.push(child);
                        }
                    }
                }
                _ => {}
            },
            Segment::Descendant(inner) => {
                let mut nodes = Vec::new();
                collect_descendants(node, &mut nodes);
                for n in nodes {
                    inner.apply(n, out);
                }
            }
        }
    }
}

fn collect_descendants<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(node);
    match node {
        Value::Array(arr) => arr.iter().for_each(|v| collect_descendants(v, out)),
        Value::Object(obj) => obj.values().for_each(|v| collect_descendants(v, out)),
        _ => {}
    }
}

fn array_get(arr: &[Value], index: i64) -> Option<&Value> {
    let resolved = if index < 0 {
        arr.len().checked_sub(index.unsigned_abs() as usize)?
    } else {
        index as usize
    };
    arr.get(resolved)
}

// ---------------------------------------------------------------------------
// Filter expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum FilterExpr {
    Or(Box<FilterExpr>, Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
    Compare(Operand, CmpOp, Operand),
    Truthy(Operand),
}

#[derive(Debug, Clone, Copy)]
enum CmpOp {
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
struct Operand {
    base: Base,
    postfix: Vec<Postfix>,
}

#[derive(Debug, Clone)]
enum Base {
    Current,
    PropertyName,
    Literal(Value),
    Undefined,
    Regex(Regex),
}

#[derive(Debug, Clone)]
enum Postfix {
    Member(String),
    Index(i64),
    Call(Method, Vec<Operand>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    StartsWith,
    EndsWith,
    Includes,
    Match,
    Test,
    ToLowerCase,
    ToUpperCase,
}

impl Method {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "startsWith" => Some(Method::StartsWith),
            "endsWith" => Some(Method::EndsWith),
            "includes" => Some(Method::Includes),
            "match" => Some(Method::Match),
            "test" => Some(Method::Test),
            "toLowerCase" => Some(Method::ToLowerCase),
            "toUpperCase" => Some(Method::ToUpperCase),
            _ => None,
        }
    }
}

/// Result of evaluating an operand.
enum Evaluated<'a> {
    Undefined,
    Value(Cow<'a, Value>),
    Regex(&'a Regex),
}

impl Evaluated<'_> {
    fn truthy(&self) -> bool {
        match self {
            Evaluated::Undefined => false,
            Evaluated::Value(v) => is_truthy(v),
            Evaluated::Regex(_) => true,
        }
    }

    fn as_value(&self) -> Option<&Value> {
        match self {
            Evaluated::Value(v) => Some(v.as_ref()),
            _ => None,
        }
    }
}

impl FilterExpr {
    fn matches(&self, current: &Value, key: &Value) -> bool {
        match self {
            FilterExpr::Or(a, b) => a.matches(current, key) || b.matches(current, key),
            FilterExpr::And(a, b) => a.matches(current, key) && b.matches(current, key),
            FilterExpr::Not(inner) => !inner.matches(current, key),
            FilterExpr::Truthy(operand) => operand.eval(current, key).truthy(),
            FilterExpr::Compare(lhs, op, rhs) => {
                let lhs = lhs.eval(current, key);
                let rhs = rhs.eval(current, key);
                compare(&lhs, *op, &rhs)
            }
        }
    }
}

impl Operand {
    fn eval<'a>(&'a self, current: &'a Value, key: &'a Value) -> Evaluated<'a> {
        let mut value = match &self.base {
            Base::Current => Evaluated::Value(Cow::Borrowed(current)),
            Base::PropertyName => Evaluated::Value(Cow::Borrowed(key)),
            Base::Literal(v) => Evaluated::Value(Cow::Borrowed(v)),
            Base::Undefined => Evaluated::Undefined,
            Base::Regex(re) => Evaluated::Regex(re),
        };

        for postfix in &self.postfix {
            value = match postfix {
                Postfix::Member(name) => member(value, name),
                Postfix::Index(index) => match value {
                    Evaluated::Value(Cow::Borrowed(Value::Array(arr))) => array_get(arr, *index)
                        .map_or(Evaluated::Undefined, |v| Evaluated::Value(Cow::Borrowed(v))),
                    Evaluated::Value(Cow::Owned(Value::Array(arr))) => array_get(&arr, *index)
                        .map_or(Evaluated::Undefined, |v| {
                            Evaluated::Value(Cow::Owned(v.clone()))
                        }),
                    other => member(other, &index.to_string()),
                },
                Postfix::Call(method, args) => {
                    let args: Vec<Evaluated<'a>> =
                        args.iter().map(|a| a.eval(current, key)).collect();
                    call(value, *method, &args)
                }
            };
        }

        value
    }
}

fn member<'a>(target: Evaluated<'a>, name: &str) -> Evaluated<'a> {
    let found = |v: &Value| -> Option<Value> {
        match v {
            Value::Object(obj) => obj.get(name).cloned(),
            Value::Array(arr) if name == "length" => Some(Value::from(arr.len())),
            Value::Array(arr) => name.parse::<usize>().ok().and_then(|i| arr.get(i).cloned()),
            Value::String(s) if name == "length" => Some(Value::from(s.encode_utf16().count())),
            _ => None,
        }
    };

    match target {
        // Borrowed values stay borrowed through plain object access.
        Evaluated::Value(Cow::Borrowed(Value::Object(obj))) => obj
            .get(name)
            .map_or(Evaluated::Undefined, |v| Evaluated::Value(Cow::Borrowed(v))),
        Evaluated::Value(v) => {
            found(v.as_ref()).map_or(Evaluated::Undefined, |v| Evaluated::Value(Cow::Owned(v)))
        }
        _ => Evaluated::Undefined,
    }
}

fn call<'a>(target: Evaluated<'a>, method: Method, args: &[Evaluated<'a>]) -> Evaluated<'a> {
    let arg_str = |i: usize| -> Option<String> {
        args.get(i).and_then(|a| a.as_value()).map(value_to_string)
    };
    let bool_value = |b: bool| Evaluated::Value(Cow::Owned(Value::Bool(b)));
    let target_str = target.as_value().and_then(|v| v.as_str());

    match method {
        Method::StartsWith => match (target_str, arg_str(0)) {
            (Some(s), Some(prefix)) => bool_value(s.starts_with(&prefix)),
            _ => Evaluated::Undefined,
        },
        Method::EndsWith => match (target_str, arg_str(0)) {
            (Some(s), Some(suffix)) => bool_value(s.ends_with(&suffix)),
            _ => Evaluated::Undefined,
        },
        Method::Includes => match (target.as_value(), args.first().and_then(|a| a.as_value())) {
            (Some(Value::String(s)), Some(needle)) => {
                bool_value(s.contains(value_to_string(needle).as_str()))
            }
            (Some(Value::Array(arr)), Some(needle)) => {
                bool_value(arr.iter().any(|item| strict_eq_values(item, needle)))
            }
            _ => Evaluated::Undefined,
        },
        Method::Match => match (target_str, args.first()) {
            (Some(s), Some(Evaluated::Regex(re))) => bool_value(re.is_match(s)),
            _ => Evaluated::Undefined,
        },
        Method::Test => match (&target, args.first().and_then(|a| a.as_value())) {
            (Evaluated::Regex(re), Some(v)) => bool_value(re.is_match(&value_to_string(v))),
            (Evaluated::Regex(_), None) => bool_value(false),
            _ => Evaluated::Undefined,
        },
        Method::ToLowerCase => match target_str {
            Some(s) => Evaluated::Value(Cow::Owned(Value::String(s.to_lowercase()))),
            None => Evaluated::Undefined,
        },
        Method::ToUpperCase => match target_str {
            Some(s) => Evaluated::Value(Cow::Owned(Value::String(s.to_uppercase()))),
            None => Evaluated::Undefined,
        },
    }
}

fn compare(lhs: &Evaluated<'_>, op: CmpOp, rhs: &Evaluated<'_>) -> bool {
    match op {
        CmpOp::StrictEq => strict_eq(lhs, rhs),
        CmpOp::StrictNe => !strict_eq(lhs, rhs),
        CmpOp::LooseEq => loose_eq(lhs, rhs),
        CmpOp::LooseNe => !loose_eq(lhs, rhs),
        CmpOp::Lt => relational(lhs, rhs).is_some_and(|o| o == Ordering::Less),
        CmpOp::Le => relational(lhs, rhs).is_some_and(|o| o != Ordering::Greater),
        CmpOp::Gt => relational(lhs, rhs).is_some_and(|o| o == Ordering::Greater),
        CmpOp::Ge => relational(lhs, rhs).is_some_and(|o| o != Ordering::Less),
    }
}

fn strict_eq(lhs: &Evaluated<'_>, rhs: &Evaluated<'_>) -> bool {
    match (lhs, rhs) {
        (Evaluated::Undefined, Evaluated::Undefined) => true,
        (Evaluated::Value(a), Evaluated::Value(b)) => strict_eq_values(a, b),
        _ => false,
    }
}

fn strict_eq_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        // Objects and arrays compare by identity in JS; structural equality
        // is the closest a value tree can offer.
        _ => a == b,
    }
}

fn loose_eq(lhs: &Evaluated<'_>, rhs: &Evaluated<'_>) -> bool {
    let nullish = |e: &Evaluated<'_>| match e {
        Evaluated::Undefined => true,
        Evaluated::Value(v) => v.is_null(),
        Evaluated::Regex(_) => false,
    };
    if nullish(lhs) || nullish(rhs) {
        return nullish(lhs) && nullish(rhs);
    }
    match (lhs.as_value(), rhs.as_value()) {
        (Some(a), Some(b)) => match (a, b) {
            (Value::String(_), Value::String(_)) => a == b,
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                a == b
            }
            _ => match (to_number(a), to_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        },
        _ => false,
    }
}

fn relational(lhs: &Evaluated<'_>, rhs: &Evaluated<'_>) -> Option<Ordering> {
    let (a, b) = (lhs.as_value()?, rhs.as_value()?);
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    to_number(a)?.partial_cmp(&to_number(b)?)
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'s> {
    source: &'s str,
    chars: Vec<char>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        PathError::Syntax {
            path: self.source.to_string(),
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        let len = s.chars().count();
        if self.pos + len <= self.chars.len()
            && self.chars[self.pos..self.pos + len].iter().copied().eq(s.chars())
        {
            self.pos += len;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), PathError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{c}`")))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_path(&mut self) -> Result<Vec<Segment>, PathError> {
        let mut segments = Vec::new();

        if !self.eat('$') && !matches!(self.peek(), None | Some('.') | Some('[')) {
            segments.push(Segment::Child(self.parse_name()?));
        }

        while let Some(c) = self.peek() {
            match c {
                '.' if self.peek_at(1) == Some('.') => {
                    self.pos += 2;
                    let inner = match self.peek() {
                        Some('*') => {
                            self.pos += 1;
                            Segment::Wildcard
                        }
                        Some('[') => self.parse_bracket()?,
                        _ => Segment::Child(self.parse_name()?),
                    };
                    segments.push(Segment::Descendant(Box::new(inner)));
                }
                '.' => {
                    self.pos += 1;
                    if self.eat('*') {
                        segments.push(Segment::Wildcard);
                    } else {
                        segments.push(Segment::Child(self.parse_name()?));
                    }
                }
                '[' => segments.push(self.parse_bracket()?),
                _ => return Err(self.error("expected `.` or `[`")),
            }
        }

        Ok(segments)
    }

    fn parse_name(&mut self) -> Result<String, PathError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '.' && c != '[') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected property name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_bracket(&mut self) -> Result<Segment, PathError> {
        self.expect('[')?;
        self.skip_ws();
        let segment = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Segment::Wildcard
            }
            Some('?') => {
                self.pos += 1;
                self.skip_ws();
                self.expect('(')?;
                let expr = self.parse_or()?;
                self.skip_ws();
                self.expect(')')?;
                Segment::Filter(expr)
            }
            Some('\'') | Some('"') => Segment::Child(self.parse_string()?),
            Some(c) if c == '-' || c.is_ascii_digit() => Segment::Index(self.parse_int()?),
            _ => return Err(self.error("unsupported bracket expression")),
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(segment)
    }

    fn parse_int(&mut self) -> Result<i64, PathError> {
        let start = self.pos;
        self.eat('-');
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse().map_err(|_| self.error("invalid index"))
    }

    fn parse_string(&mut self) -> Result<String, PathError> {
        let quote = self.peek().ok_or_else(|| self.error("expected string"))?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self
                .peek()
                .ok_or_else(|| self.error("unterminated string"))?;
            self.pos += 1;
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn parse_or(&mut self) -> Result<FilterExpr, PathError> {
        let mut lhs = self.parse_and()?;
        loop {
            self.skip_ws();
            if !self.eat_str("||") {
                return Ok(lhs);
            }
            let rhs = self.parse_and()?;
            lhs = FilterExpr::Or(Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_and(&mut self) -> Result<FilterExpr, PathError> {
        let mut lhs = self.parse_unary()?;
        loop {
            self.skip_ws();
            if !self.eat_str("&&") {
                return Ok(lhs);
            }
            let rhs = self.parse_unary()?;
            lhs = FilterExpr::And(Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<FilterExpr, PathError> {
        self.skip_ws();
        if self.peek() == Some('!') && self.peek_at(1) != Some('=') {
            self.pos += 1;
            return Ok(FilterExpr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat('(') {
            let inner = self.parse_or()?;
            self.skip_ws();
            self.expect(')')?;
            return Ok(inner);
        }

        let lhs = self.parse_operand()?;
        self.skip_ws();
        let op = if self.eat_str("===") {
            CmpOp::StrictEq
        } else if self.eat_str("!==") {
            CmpOp::StrictNe
        } else if self.eat_str("==") {
            CmpOp::LooseEq
        } else if self.eat_str("!=") {
            CmpOp::LooseNe
        } else if self.eat_str("<=") {
            CmpOp::Le
        } else if self.eat_str(">=") {
            CmpOp::Ge
        } else if self.eat('<') {
            CmpOp::Lt
        } else if self.eat('>') {
            CmpOp::Gt
        } else {
            return Ok(FilterExpr::Truthy(lhs));
        };
        let rhs = self.parse_operand()?;
        Ok(FilterExpr::Compare(lhs, op, rhs))
    }

    fn parse_operand(&mut self) -> Result<Operand, PathError> {
        self.skip_ws();
        let base = match self.peek() {
            Some('@') => {
                self.pos += 1;
                if self.eat_str("property") {
                    Base::PropertyName
                } else {
                    Base::Current
                }
            }
            Some('\'') | Some('"') => Base::Literal(Value::String(self.parse_string()?)),
            Some('/') => Base::Regex(self.parse_regex()?),
            Some(c) if c == '-' || c.is_ascii_digit() => Base::Literal(self.parse_number()?),
            Some(c) if c.is_alphabetic() => match self.parse_ident().as_str() {
                "true" => Base::Literal(Value::Bool(true)),
                "false" => Base::Literal(Value::Bool(false)),
                "null" => Base::Literal(Value::Null),
                "undefined" => Base::Undefined,
                other => return Err(self.error(format!("unknown identifier `{other}`"))),
            },
            _ => return Err(self.error("expected operand")),
        };

        let mut postfix = Vec::new();
        loop {
            if self.peek() == Some('.') {
                self.pos += 1;
                let name = self.parse_ident();
                if name.is_empty() {
                    return Err(self.error("expected member name"));
                }
                self.skip_ws();
                if self.peek() == Some('(') {
                    let method = Method::from_name(&name)
                        .ok_or_else(|| self.error(format!("unsupported method `{name}`")))?;
                    let args = self.parse_args()?;
                    postfix.push(Postfix::Call(method, args));
                } else {
                    postfix.push(Postfix::Member(name));
                }
            } else if self.peek() == Some('[') {
                self.pos += 1;
                self.skip_ws();
                let accessor = match self.peek() {
                    Some('\'') | Some('"') => Postfix::Member(self.parse_string()?),
                    _ => Postfix::Index(self.parse_int()?),
                };
                self.skip_ws();
                self.expect(']')?;
                postfix.push(accessor);
            } else {
                break;
            }
        }

        Ok(Operand { base, postfix })
    }

    fn parse_args(&mut self) -> Result<Vec<Operand>, PathError> {
        self.expect('(')?;
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_operand()?);
            self.skip_ws();
            if self.eat(')') {
                return Ok(args);
            }
            self.expect(',')?;
        }
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_number(&mut self) -> Result<Value, PathError> {
        let start = self.pos;
        self.eat('-');
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::from(int));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.error(format!("invalid number `{text}`")))
    }

    fn parse_regex(&mut self) -> Result<Regex, PathError> {
        self.expect('/')?;
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            let c = self
                .peek()
                .ok_or_else(|| self.error("unterminated regex"))?;
            self.pos += 1;
            match c {
                '\\' => {
                    pattern.push(c);
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("unterminated regex"))?;
                    self.pos += 1;
                    pattern.push(escaped);
                }
                '[' => {
                    in_class = true;
                    pattern.push(c);
                }
                ']' => {
                    in_class = false;
                    pattern.push(c);
                }
                '/' if !in_class => break,
                c => pattern.push(c),
            }
        }

        let mut flags = String::new();
        while let Some(flag) = self.peek().filter(char::is_ascii_alphabetic) {
            self.pos += 1;
            match flag {
                'i' | 'm' | 's' => flags.push(flag),
                // Global/sticky/unicode have no meaning for a boolean test.
                'g' | 'y' | 'u' => {}
                other => return Err(self.error(format!("unsupported regex flag `{other}`"))),
            }
        }

        let full = if flags.is_empty() {
            pattern
        } else {
            format!("(?{flags}){pattern}")
        };
        Regex::new(&full).map_err(|e| self.error(format!("invalid regex: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Convert a JSON value to its string form (strings unquoted, containers as
/// compact JSON).
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => value.to_string(), // Arrays and objects as JSON strings
    }
}
