//! Hand-written recursive-descent scanner turning a pattern string into an
//! unlinked [`ParsedPattern`].
//!
//! Every failure mode unwinds through a single `Result<_, ErrorTrace>`
//! return; the compiler never partially succeeds, so the first fragment
//! raised is also the last — this parser stops at the first error rather
//! than attempting the error-recovery continuation a linting tool would
//! want.

use nanofuzz_core::error_trace::{ErrorCode, ErrorFragment, ErrorTrace};
use nanofuzz_core::label::{djb2, is_valid_label};
use nanofuzz_core::limits::{
    MAX_ALTERNATION_ARMS, MAX_LABEL_LEN, MAX_NESTING_DEPTH, MAX_PATTERN_LEN, MAX_RANGE_SUBRANGES,
};

use crate::block::{
    Block, ByteRange, Declaration, LenFormat, LenOptions, ParsedPattern, RangeSet, Reference, ReferenceKind,
    Repetition,
};

/// Parse a complete pattern, returning the top-level block list and any
/// `<$NAME>` declarations collected along the way.
pub fn parse(pattern: &str) -> Result<ParsedPattern, ErrorTrace> {
    if pattern.len() > MAX_PATTERN_LEN {
        let mut trace = ErrorTrace::new();
        trace.push(ErrorFragment::new(
            ErrorCode::TooMuchNesting,
            0,
            pattern.len(),
            format!("pattern is {} bytes, exceeding the {} byte limit", pattern.len(), MAX_PATTERN_LEN),
        ));
        return Err(trace);
    }

    let mut parser = Parser { src: pattern.as_bytes(), pos: 0, declared: Vec::new(), declarations: Vec::new() };
    let blocks = parser.parse_sequence(0)?;
    if parser.pos < parser.src.len() {
        return Err(parser.fail(0, ErrorCode::InvalidSyntax, "unexpected ')' with nothing open to close"));
    }
    Ok(ParsedPattern { blocks, declarations: parser.declarations })
}

/// Bookkeeping for an alternation (`a|b|c`) under construction at the
/// current scope.
struct AltState {
    branch_root_idx: usize,
    steps: Vec<usize>,
    jmp_indices: Vec<usize>,
    pending_arm_start: usize,
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    /// Names declared so far, in source order, for forward-reference
    /// rejection.
    declared: Vec<String>,
    declarations: Vec<Declaration>,
}

fn is_special(c: u8) -> bool {
    matches!(c, b'\\' | b'[' | b']' | b'{' | b'}' | b'(' | b')' | b'<' | b'>' | b'|')
}

fn decode_named_escape(c: u8) -> Option<u8> {
    match c {
        b'n' => Some(0x0A),
        b'r' => Some(0x0D),
        b't' => Some(0x09),
        b'b' => Some(0x08),
        b'f' => Some(0x0C),
        b'v' => Some(0x0B),
        b'a' => Some(0x07),
        b's' => Some(b' '),
        _ => None,
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl<'a> Parser<'a> {
    fn fail(&self, nest_level: usize, code: ErrorCode, msg: impl Into<String>) -> ErrorTrace {
        let mut trace = ErrorTrace::new();
        trace.push(ErrorFragment::new(code, nest_level, self.pos, msg));
        trace
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, c: u8, nest_level: usize, what: &str) -> Result<(), ErrorTrace> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.fail(nest_level, ErrorCode::InvalidSyntax, format!("expected '{}' {}", c as char, what)))
        }
    }

    /// Parses a `\X` escape (the `\` has not yet been consumed). Does not
    /// handle the range-set-only `\dDDD`/`\oOOO` forms.
    fn parse_escape(&mut self, nest_level: usize) -> Result<u8, ErrorTrace> {
        self.advance(); // consume '\'
        let c = self.advance().ok_or_else(|| {
            self.fail(nest_level, ErrorCode::InvalidSyntax, "unterminated escape at end of pattern")
        })?;
        if c == b'x' {
            let hi = self
                .advance()
                .and_then(hex_digit)
                .ok_or_else(|| self.fail(nest_level, ErrorCode::InvalidSyntax, "\\x without two hex digits"))?;
            let lo = self
                .advance()
                .and_then(hex_digit)
                .ok_or_else(|| self.fail(nest_level, ErrorCode::InvalidSyntax, "\\x without two hex digits"))?;
            return Ok((hi << 4) | lo);
        }
        Ok(decode_named_escape(c).unwrap_or(c))
    }

    /// One byte-valued token inside a `[...]` range set: a literal byte, a
    /// named `\X` escape, `\xHH`, `\dDDD`, or `\oOOO`.
    fn parse_range_token(&mut self, nest_level: usize) -> Result<u8, ErrorTrace> {
        match self.peek() {
            None => Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "unclosed '[' range set")),
            Some(b'\\') => {
                self.pos += 1;
                let c = self.advance().ok_or_else(|| {
                    self.fail(nest_level, ErrorCode::InvalidSyntax, "unterminated escape in range set")
                })?;
                match c {
                    b'x' => {
                        let hi = self.advance().and_then(hex_digit).ok_or_else(|| {
                            self.fail(nest_level, ErrorCode::InvalidSyntax, "\\x without two hex digits")
                        })?;
                        let lo = self.advance().and_then(hex_digit).ok_or_else(|| {
                            self.fail(nest_level, ErrorCode::InvalidSyntax, "\\x without two hex digits")
                        })?;
                        Ok((hi << 4) | lo)
                    }
                    b'd' => self.read_radix_digits(nest_level, 10, 3),
                    b'o' => self.read_radix_digits(nest_level, 8, 3),
                    other => Ok(decode_named_escape(other).unwrap_or(other)),
                }
            }
            Some(c) => {
                self.pos += 1;
                Ok(c)
            }
        }
    }

    fn read_radix_digits(&mut self, nest_level: usize, radix: u32, max_digits: usize) -> Result<u8, ErrorTrace> {
        let mut value: u32 = 0;
        let mut count = 0;
        while count < max_digits {
            match self.peek().and_then(|c| (c as char).to_digit(radix)) {
                Some(d) => {
                    value = value * radix + d;
                    self.pos += 1;
                    count += 1;
                }
                None => break,
            }
        }
        if count == 0 || value > 255 {
            return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "invalid \\d or \\o byte value"));
        }
        Ok(value as u8)
    }

    fn parse_range_set(&mut self, nest_level: usize) -> Result<RangeSet, ErrorTrace> {
        self.pos += 1; // consume '['
        let negate = if self.peek() == Some(b'^') {
            self.pos += 1;
            true
        } else {
            false
        };

        let mut items: Vec<ByteRange> = Vec::new();
        let mut covered = [false; 256];
        loop {
            match self.peek() {
                None => return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "unclosed '[' range set")),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => {
                    return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "empty item in range set"));
                }
                Some(b'-') => {
                    return Err(self.fail(
                        nest_level,
                        ErrorCode::InvalidSyntax,
                        "unescaped '-' cannot start a range set item",
                    ));
                }
                _ => {}
            }

            let lo = self.parse_range_token(nest_level)?;
            let range = if self.peek() == Some(b'-') {
                self.pos += 1;
                let hi = self.parse_range_token(nest_level)?;
                if hi < lo {
                    return Err(self.fail(
                        nest_level,
                        ErrorCode::InvalidSyntax,
                        "range set sub-range has high bound below low bound",
                    ));
                }
                ByteRange { lo, hi }
            } else {
                ByteRange::single(lo)
            };

            for b in range.lo..=range.hi {
                if covered[b as usize] {
                    return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "overlapping range set sub-ranges"));
                }
                covered[b as usize] = true;
            }
            items.push(range);
            if items.len() > MAX_RANGE_SUBRANGES {
                return Err(self.fail(nest_level, ErrorCode::TooMuchNesting, "too many range set sub-ranges"));
            }

            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => {
                    self.pos += 1;
                    if self.peek() == Some(b']') {
                        return Err(self.fail(
                            nest_level,
                            ErrorCode::InvalidSyntax,
                            "trailing ',' in range set",
                        ));
                    }
                }
                _ => {
                    return Err(self.fail(
                        nest_level,
                        ErrorCode::InvalidSyntax,
                        "expected ',' or ']' in range set",
                    ));
                }
            }
        }

        if items.is_empty() {
            return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "empty range set"));
        }

        let ranges = if negate {
            let mut gaps = Vec::new();
            let mut b: usize = 0;
            while b < 256 {
                if covered[b] {
                    b += 1;
                    continue;
                }
                let start = b;
                while b < 256 && !covered[b] {
                    b += 1;
                }
                gaps.push(ByteRange { lo: start as u8, hi: (b - 1) as u8 });
            }
            if gaps.is_empty() {
                return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "negated range set matches no bytes"));
            }
            if gaps.len() > MAX_RANGE_SUBRANGES {
                return Err(self.fail(
                    nest_level,
                    ErrorCode::TooMuchNesting,
                    "negated range set produces too many sub-ranges",
                ));
            }
            gaps
        } else {
            items
        };

        Ok(RangeSet { ranges })
    }

    /// Parses a `{n}`, `{n,m}`, `{,m}`, or `{n,}` repetition and returns it.
    fn parse_repetition(&mut self, nest_level: usize) -> Result<Repetition, ErrorTrace> {
        self.pos += 1; // consume '{'
        let base_str = self.read_digits();
        if self.peek() == Some(b',') {
            self.pos += 1;
            let high_str = self.read_digits();
            self.expect(b'}', nest_level, "to close repetition")?;
            let base = if base_str.is_empty() {
                0
            } else {
                parse_u16(&base_str)
                    .ok_or_else(|| self.fail(nest_level, ErrorCode::InvalidSyntax, "repetition count out of range"))?
            };
            let high = if high_str.is_empty() {
                u16::MAX
            } else {
                parse_u16(&high_str)
                    .ok_or_else(|| self.fail(nest_level, ErrorCode::InvalidSyntax, "repetition count out of range"))?
            };
            if base > high {
                return Err(self.fail(
                    nest_level,
                    ErrorCode::InvalidSyntax,
                    "repetition lower bound exceeds upper bound",
                ));
            }
            Ok(Repetition::range(base, high))
        } else {
            self.expect(b'}', nest_level, "to close repetition")?;
            if base_str.is_empty() {
                return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "empty repetition"));
            }
            let n = parse_u16(&base_str)
                .ok_or_else(|| self.fail(nest_level, ErrorCode::InvalidSyntax, "repetition count out of range"))?;
            Ok(Repetition::exact(n))
        }
    }

    fn read_digits(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn read_label(&mut self, nest_level: usize) -> Result<String, ErrorTrace> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_uppercase() || c.is_ascii_digit()) {
            self.pos += 1;
        }
        let label = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        if label.is_empty() {
            return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "empty or malformed label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(self.fail(nest_level, ErrorCode::TooMuchNesting, "label exceeds 8 character limit"));
        }
        debug_assert!(is_valid_label(&label));
        Ok(label)
    }

    /// Parses the body of `<...>` after the opening `<` has been consumed,
    /// dispatching on the following sigil. Appends the resulting block (if
    /// any) to `blocks` and updates `last_unit_start`/`pending_decl`.
    fn parse_angle(
        &mut self,
        nest_level: usize,
        blocks: &mut Vec<Block>,
        last_unit_start: &mut Option<usize>,
        pending_decl: &mut Option<usize>,
    ) -> Result<(), ErrorTrace> {
        self.pos += 1; // consume '<'
        match self.peek() {
            Some(b'$') => {
                self.pos += 1;
                let name = self.read_label(nest_level)?;
                self.expect(b'>', nest_level, "to close declaration")?;
                if nest_level != 0 {
                    return Err(self.fail(
                        nest_level,
                        ErrorCode::InvalidSyntax,
                        "declaration is only legal at the top nesting level",
                    ));
                }
                let sub_idx = pending_decl.take().ok_or_else(|| {
                    self.fail(
                        nest_level,
                        ErrorCode::InvalidSyntax,
                        "declaration must immediately follow a subsequence",
                    )
                })?;
                if self.declared.iter().any(|d| d == &name) {
                    return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "duplicate declaration"));
                }
                let body = blocks.split_off(sub_idx);
                let hash = djb2(&name);
                self.declared.push(name.clone());
                self.declarations.push(Declaration { name, hash, body });
                *last_unit_start = None;
                Ok(())
            }
            Some(b'@') => {
                self.pos += 1;
                let name = self.read_label(nest_level)?;
                self.expect(b'>', nest_level, "to close reference")?;
                self.push_reference(blocks, last_unit_start, nest_level, name, ReferenceKind::Paste)
            }
            Some(b'%') => {
                self.pos += 1;
                let name = self.read_label(nest_level)?;
                self.expect(b'>', nest_level, "to close reference")?;
                self.push_reference(blocks, last_unit_start, nest_level, name, ReferenceKind::Shuffle)
            }
            Some(b'#') => {
                self.pos += 1;
                let lenopts = self.parse_lenopts(nest_level)?;
                self.expect(b':', nest_level, "before length reference name")?;
                let name = self.read_label(nest_level)?;
                self.expect(b'>', nest_level, "to close reference")?;
                self.push_reference(blocks, last_unit_start, nest_level, name, ReferenceKind::Length(lenopts))
            }
            Some(_) | None => {
                Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "expected '$', '@', '%' or '#' after '<'"))
            }
        }
    }

    fn push_reference(
        &mut self,
        blocks: &mut Vec<Block>,
        last_unit_start: &mut Option<usize>,
        nest_level: usize,
        name: String,
        kind: ReferenceKind,
    ) -> Result<(), ErrorTrace> {
        if !self.declared.iter().any(|d| d == &name) {
            return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, format!("reference to undeclared name '{name}'")));
        }
        let hash = djb2(&name);
        blocks.push(Block::Reference { reference: Reference { name, hash, kind }, count: Repetition::ONE });
        *last_unit_start = Some(blocks.len() - 1);
        Ok(())
    }

    fn parse_lenopts(&mut self, nest_level: usize) -> Result<LenOptions, ErrorTrace> {
        let format = match self.advance() {
            Some(b'g') => LenFormat::RawBig,
            Some(b'l') => LenFormat::RawLittle,
            Some(b'b') => LenFormat::Binary,
            Some(b'd') => LenFormat::Decimal,
            Some(b'x') => LenFormat::Hex,
            Some(b'X') => LenFormat::HexUpper,
            Some(b'o') => LenFormat::Octal,
            _ => return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "unknown length format code")),
        };

        let width_str = self.read_digits();
        let width: u16 = if width_str.is_empty() {
            0
        } else {
            parse_u16(&width_str)
                .ok_or_else(|| self.fail(nest_level, ErrorCode::InvalidSyntax, "length format width out of range"))?
        };
        let (min_width, max_width, zero_ok) = match format {
            LenFormat::RawBig | LenFormat::RawLittle => (1u16, 8u16, false),
            LenFormat::Binary => (1, 64, false),
            LenFormat::Decimal => (0, 20, true),
            LenFormat::Hex | LenFormat::HexUpper => (0, 16, true),
            LenFormat::Octal => (0, 22, true),
        };
        if width == 0 && !zero_ok {
            return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "length format requires an explicit width"));
        }
        if width > max_width || (width != 0 && width < min_width) {
            return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "length format width out of range"));
        }

        let add: i64 = match self.peek() {
            Some(b'+') => {
                self.pos += 1;
                let digits = self.read_digits();
                if digits.is_empty() {
                    return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "malformed length format addend"));
                }
                digits
                    .parse::<i64>()
                    .map_err(|_| self.fail(nest_level, ErrorCode::InvalidSyntax, "malformed length format addend"))?
            }
            Some(b'-') => {
                self.pos += 1;
                let digits = self.read_digits();
                if digits.is_empty() {
                    return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "malformed length format addend"));
                }
                -digits
                    .parse::<i64>()
                    .map_err(|_| self.fail(nest_level, ErrorCode::InvalidSyntax, "malformed length format addend"))?
            }
            _ => 0,
        };

        Ok(LenOptions { format, width, add })
    }

    /// Parses a sequence of blocks until a `)` (not consumed) or end of
    /// input. `nest_level` is the depth at which this sequence lives.
    fn parse_sequence(&mut self, nest_level: usize) -> Result<Vec<Block>, ErrorTrace> {
        let mut blocks: Vec<Block> = Vec::new();
        let mut literal: Vec<u8> = Vec::new();
        let mut last_unit_start: Option<usize> = None;
        let mut pending_decl: Option<usize> = None;
        let mut alt: Option<AltState> = None;

        macro_rules! flush_literal {
            () => {
                if !literal.is_empty() {
                    blocks.push(Block::String { data: std::mem::take(&mut literal), count: Repetition::ONE });
                    last_unit_start = Some(blocks.len() - 1);
                }
            };
        }

        loop {
            let is_decl_lookahead = self.peek() == Some(b'<') && self.peek_at(1) == Some(b'$');
            let is_rep_lookahead = self.peek() == Some(b'{');
            if !is_decl_lookahead && !(is_rep_lookahead && last_unit_start == pending_decl && pending_decl.is_some())
            {
                pending_decl = None;
            }

            match self.peek() {
                None => break,
                Some(b')') => break,
                Some(b'\\') => {
                    let byte = self.parse_escape(nest_level)?;
                    literal.push(byte);
                }
                Some(c) if !is_special(c) => {
                    self.pos += 1;
                    literal.push(c);
                }
                Some(b'[') => {
                    flush_literal!();
                    let set = self.parse_range_set(nest_level)?;
                    blocks.push(Block::Range { set, count: Repetition::ONE });
                    last_unit_start = Some(blocks.len() - 1);
                }
                Some(b'(') => {
                    flush_literal!();
                    self.pos += 1;
                    if nest_level + 1 > MAX_NESTING_DEPTH {
                        return Err(self.fail(nest_level, ErrorCode::TooMuchNesting, "subsequence nesting too deep"));
                    }
                    let body = self.parse_sequence(nest_level + 1)?;
                    if self.peek() != Some(b')') {
                        return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "unclosed '('"));
                    }
                    self.pos += 1;

                    let sub_idx = blocks.len();
                    blocks.push(Block::Sub { count: Repetition::ONE, nest_id: nest_level });
                    let body_len = body.len();
                    blocks.extend(body);
                    blocks.push(Block::Ret { back_offset: body_len });
                    last_unit_start = Some(sub_idx);
                    pending_decl = Some(sub_idx);
                }
                Some(b'{') => {
                    flush_literal!();
                    let target = last_unit_start.ok_or_else(|| {
                        self.fail(nest_level, ErrorCode::InvalidSyntax, "repetition follows nothing")
                    })?;
                    let rep = self.parse_repetition(nest_level)?;
                    let slot = blocks[target].count_mut().ok_or_else(|| {
                        self.fail(nest_level, ErrorCode::InvalidSyntax, "repetition cannot attach to this block")
                    })?;
                    *slot = rep;
                    last_unit_start = None;
                }
                Some(b'<') => {
                    flush_literal!();
                    self.parse_angle(nest_level, &mut blocks, &mut last_unit_start, &mut pending_decl)?;
                }
                Some(b'|') => {
                    flush_literal!();
                    match alt.take() {
                        None => {
                            let unit_start = last_unit_start.ok_or_else(|| {
                                self.fail(nest_level, ErrorCode::InvalidSyntax, "alternation follows nothing")
                            })?;
                            blocks.insert(unit_start, Block::BranchRoot { steps: vec![1] });
                            let jmp_idx = blocks.len();
                            blocks.push(Block::BranchJmp { forward_offset: 0 });
                            alt = Some(AltState {
                                branch_root_idx: unit_start,
                                steps: vec![1],
                                jmp_indices: vec![jmp_idx],
                                pending_arm_start: blocks.len(),
                            });
                        }
                        Some(mut state) => {
                            if blocks.len() == state.pending_arm_start {
                                return Err(self.fail(
                                    nest_level,
                                    ErrorCode::InvalidSyntax,
                                    "empty alternation arm",
                                ));
                            }
                            state.steps.push(state.pending_arm_start - state.branch_root_idx);
                            if state.steps.len() > MAX_ALTERNATION_ARMS {
                                return Err(self.fail(
                                    nest_level,
                                    ErrorCode::TooMuchNesting,
                                    "too many alternation arms",
                                ));
                            }
                            let jmp_idx = blocks.len();
                            blocks.push(Block::BranchJmp { forward_offset: 0 });
                            state.jmp_indices.push(jmp_idx);
                            state.pending_arm_start = blocks.len();
                            alt = Some(state);
                        }
                    }
                    last_unit_start = None;
                }
                Some(c @ (b']' | b'}' | b'>')) => {
                    return Err(self.fail(
                        nest_level,
                        ErrorCode::InvalidSyntax,
                        format!("stray '{}' with nothing open to close", c as char),
                    ));
                }
                Some(_) => unreachable!("is_special covers every remaining branch"),
            }
        }

        flush_literal!();

        if let Some(state) = alt {
            if blocks.len() == state.pending_arm_start {
                return Err(self.fail(nest_level, ErrorCode::InvalidSyntax, "scope ends with '|'"));
            }
            let mut state = state;
            state.steps.push(state.pending_arm_start - state.branch_root_idx);
            let post_branch_idx = blocks.len();
            for jmp_idx in state.jmp_indices {
                blocks[jmp_idx] = Block::BranchJmp { forward_offset: post_branch_idx - jmp_idx };
            }
            blocks[state.branch_root_idx] = Block::BranchRoot { steps: state.steps };
        }

        Ok(blocks)
    }
}

fn parse_u16(s: &str) -> Option<u16> {
    s.parse::<u32>().ok().filter(|v| *v <= u16::MAX as u32).map(|v| v as u16)
}
