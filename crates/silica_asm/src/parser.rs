//! Recursive-descent parser for the assembly surface syntax.
//!
//! Function and process bodies are parsed in textual order: block
//! labels are pre-scanned so branches may target later blocks, and
//! every value use must be preceded by its definition. Entity bodies
//! are resolved in dependency order instead — textual use-before-def is
//! legal there, and the printed order is preserved in the layout.

use crate::lexer::lex;
use crate::token::{Token, TokenKind};
use num_bigint::BigInt;
use silica_common::{LogicVec, TimeValue};
use silica_ir::{
    Block, Inst, Module, Signature, Type, UnitBuilder, UnitData, UnitKind, UnitName, Value,
};
use std::collections::BTreeMap;

/// A parse failure with its 1-based source line.
#[derive(Debug, Clone, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// The 1-based source line of the failure.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// An instruction-level failure: undefined names are retried when the
/// unit admits out-of-order definitions (entities), everything else is
/// fatal.
enum LineError {
    Undefined { name: String, line: usize },
    Fatal(ParseError),
}

impl From<ParseError> for LineError {
    fn from(err: ParseError) -> Self {
        LineError::Fatal(err)
    }
}

impl LineError {
    fn into_fatal(self) -> ParseError {
        match self {
            LineError::Undefined { name, line } => {
                ParseError::new(line, format!("use of undefined value `%{name}`"))
            }
            LineError::Fatal(err) => err,
        }
    }
}

/// Parses a module from assembly text.
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    // ------------------------------------------------------------------
    // Primitive operations
    // ------------------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if !self.at(TokenKind::Eof) {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.current().line, message)
    }

    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.bump();
        }
    }

    /// Requires the end of an instruction line: a newline, or the
    /// closing brace of the unit.
    fn end_line(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::Newline) {
            self.bump();
            Ok(())
        } else if self.at(TokenKind::RBrace) {
            Ok(())
        } else {
            Err(self.error("expected end of line"))
        }
    }

    // ------------------------------------------------------------------
    // Module and unit headers
    // ------------------------------------------------------------------

    fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut module = Module::new();
        self.skip_newlines();
        while !self.at(TokenKind::Eof) {
            let keyword = self.expect(TokenKind::Word, "a unit keyword")?;
            match keyword.text.as_str() {
                "func" => self.parse_func(&mut module)?,
                "proc" => self.parse_proc_or_entity(&mut module, UnitKind::Process)?,
                "entity" => self.parse_proc_or_entity(&mut module, UnitKind::Entity)?,
                "decl" => self.parse_decl(&mut module)?,
                other => {
                    return Err(ParseError::new(
                        keyword.line,
                        format!("expected `func`, `proc`, `entity`, or `decl`, got `{other}`"),
                    ))
                }
            }
            self.skip_newlines();
        }
        Ok(module)
    }

    fn parse_func(&mut self, module: &mut Module) -> Result<(), ParseError> {
        let name = self.expect(TokenKind::AtName, "a unit name")?;
        let params = self.parse_params()?;
        let ret = self.parse_type()?;
        let sig = Signature::new_function(params.iter().map(|(ty, _)| ty.clone()).collect(), ret);
        let mut unit = UnitData::new(UnitKind::Function, UnitName::new(name.text.as_str()), sig)
            .map_err(|err| ParseError::new(name.line, err.to_string()))?;
        let mut values = self.bind_args(&mut unit, &params, &[]);
        self.expect(TokenKind::LBrace, "`{`")?;
        self.parse_cfg_body(&mut unit, &mut values)?;
        self.expect(TokenKind::RBrace, "`}`")?;
        module
            .add_unit(unit)
            .map_err(|err| ParseError::new(name.line, err.to_string()))?;
        Ok(())
    }

    fn parse_proc_or_entity(
        &mut self,
        module: &mut Module,
        kind: UnitKind,
    ) -> Result<(), ParseError> {
        let name = self.expect(TokenKind::AtName, "a unit name")?;
        let inputs = self.parse_params()?;
        self.expect(TokenKind::Arrow, "`->`")?;
        let outputs = self.parse_params()?;
        let sig = Signature::new_ports(
            inputs.iter().map(|(ty, _)| ty.clone()).collect(),
            outputs.iter().map(|(ty, _)| ty.clone()).collect(),
        );
        let mut unit = UnitData::new(kind, UnitName::new(name.text.as_str()), sig)
            .map_err(|err| ParseError::new(name.line, err.to_string()))?;
        let mut values = self.bind_args(&mut unit, &inputs, &outputs);
        self.expect(TokenKind::LBrace, "`{`")?;
        match kind {
            UnitKind::Entity => self.parse_entity_body(&mut unit, &mut values)?,
            _ => self.parse_cfg_body(&mut unit, &mut values)?,
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        module
            .add_unit(unit)
            .map_err(|err| ParseError::new(name.line, err.to_string()))?;
        Ok(())
    }

    fn parse_decl(&mut self, module: &mut Module) -> Result<(), ParseError> {
        let name = self.expect(TokenKind::AtName, "a unit name")?;
        let inputs = self.parse_params()?;
        let input_types: Vec<Type> = inputs.into_iter().map(|(ty, _)| ty).collect();
        let sig = if self.eat(TokenKind::Arrow) {
            let outputs = self.parse_params()?;
            Signature::new_ports(
                input_types,
                outputs.into_iter().map(|(ty, _)| ty).collect(),
            )
        } else if self.at_type() {
            let ret = self.parse_type()?;
            Signature::new_function(input_types, ret)
        } else {
            Signature::new_ports(input_types, Vec::new())
        };
        module
            .declare(UnitName::new(name.text.as_str()), sig)
            .map_err(|err| ParseError::new(name.line, err.to_string()))?;
        Ok(())
    }

    /// Binds argument names into the unit and the value scope.
    fn bind_args(
        &self,
        unit: &mut UnitData,
        inputs: &[(Type, Option<String>)],
        outputs: &[(Type, Option<String>)],
    ) -> BTreeMap<String, Value> {
        let mut values = BTreeMap::new();
        for (index, (_, name)) in inputs.iter().chain(outputs.iter()).enumerate() {
            let value = unit.dfg.arg_value(index);
            if let Some(name) = name {
                values.insert(name.clone(), value);
                if !is_numeric(name) {
                    unit.dfg.set_value_name(value, name.clone());
                }
            }
        }
        values
    }

    /// `( [type [%name] {, type [%name]}] )`
    #[allow(clippy::type_complexity)]
    fn parse_params(&mut self) -> Result<Vec<(Type, Option<String>)>, ParseError> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let ty = self.parse_type()?;
                let name = if self.at(TokenKind::PercentName) {
                    Some(self.bump().text)
                } else {
                    None
                };
                params.push((ty, name));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn at_type(&self) -> bool {
        match self.kind() {
            TokenKind::LBracket | TokenKind::LBrace => true,
            TokenKind::Word => {
                let text = &self.current().text;
                matches!(text.as_str(), "void" | "time" | "label")
                    || int_width(text).is_some()
                    || logic_width(text).is_some()
            }
            _ => false,
        }
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let mut ty = match self.kind() {
            TokenKind::Word => {
                let token = self.bump();
                match token.text.as_str() {
                    "void" => Type::Void,
                    "time" => Type::Time,
                    "label" => Type::Label,
                    text => {
                        if let Some(width) = int_width(text) {
                            Type::Int(width)
                        } else if let Some(width) = logic_width(text) {
                            Type::Logic(width)
                        } else {
                            return Err(ParseError::new(
                                token.line,
                                format!("expected a type, got `{text}`"),
                            ));
                        }
                    }
                }
            }
            TokenKind::LBracket => {
                self.bump();
                let size = self.parse_number()?;
                let sep = self.expect(TokenKind::Word, "`x`")?;
                if sep.text != "x" {
                    return Err(ParseError::new(sep.line, "expected `x` in array type"));
                }
                let element = self.parse_type()?;
                self.expect(TokenKind::RBracket, "`]`")?;
                Type::array(size, element)
            }
            TokenKind::LBrace => {
                self.bump();
                let mut fields = Vec::new();
                if !self.at(TokenKind::RBrace) {
                    loop {
                        fields.push(self.parse_type()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrace, "`}`")?;
                Type::Struct(fields)
            }
            _ => return Err(self.error("expected a type")),
        };
        loop {
            if self.eat(TokenKind::Dollar) {
                ty = Type::signal(ty);
            } else if self.eat(TokenKind::Star) {
                ty = Type::pointer(ty);
            } else {
                return Ok(ty);
            }
        }
    }

    fn parse_number(&mut self) -> Result<u32, ParseError> {
        let token = self.expect(TokenKind::Number, "a number")?;
        token
            .text
            .parse()
            .map_err(|_| ParseError::new(token.line, "number out of range"))
    }

    // ------------------------------------------------------------------
    // Unit bodies
    // ------------------------------------------------------------------

    /// Parses a block-structured body. Labels are pre-scanned so
    /// branches can reference later blocks.
    fn parse_cfg_body(
        &mut self,
        unit: &mut UnitData,
        values: &mut BTreeMap<String, Value>,
    ) -> Result<(), ParseError> {
        self.skip_newlines();
        let mut builder = UnitBuilder::new(unit);

        // Pre-scan for `label:` lines up to the matching `}`.
        let mut blocks: BTreeMap<String, Block> = BTreeMap::new();
        let mut depth = 1usize;
        let mut line_start = true;
        let mut index = self.pos;
        while index < self.tokens.len() {
            let token = &self.tokens[index];
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Newline => {
                    line_start = true;
                    index += 1;
                    continue;
                }
                TokenKind::Word
                    if line_start
                        && self.tokens.get(index + 1).map(|t| t.kind)
                            == Some(TokenKind::Colon) =>
                {
                    if blocks.contains_key(&token.text) {
                        return Err(ParseError::new(
                            token.line,
                            format!("duplicate block label `{}`", token.text),
                        ));
                    }
                    let bb = builder.named_block(token.text.as_str());
                    blocks.insert(token.text.clone(), bb);
                }
                _ => {}
            }
            line_start = false;
            index += 1;
        }

        // Main pass: labels switch the insertion block, everything else
        // is an instruction.
        let mut started = false;
        loop {
            self.skip_newlines();
            if self.at(TokenKind::RBrace) || self.at(TokenKind::Eof) {
                return Ok(());
            }
            if self.at(TokenKind::Word) && self.peek_kind(1) == TokenKind::Colon {
                let label = self.bump();
                self.bump();
                builder.append_to(blocks[&label.text]);
                started = true;
                self.end_line()?;
                continue;
            }
            if !started {
                return Err(self.error("expected a block label"));
            }
            self.parse_inst(&mut builder, values, &blocks)
                .map_err(LineError::into_fatal)?;
            self.end_line()?;
        }
    }

    /// Parses a flat entity body, resolving textual use-before-def by
    /// retrying lines until their operands exist. The printed order is
    /// preserved in the layout.
    fn parse_entity_body(
        &mut self,
        unit: &mut UnitData,
        values: &mut BTreeMap<String, Value>,
    ) -> Result<(), ParseError> {
        self.skip_newlines();
        let blocks = BTreeMap::new();
        let mut builder = UnitBuilder::new(unit);

        // Collect the token range of each line up to the matching `}`.
        let mut lines: Vec<usize> = Vec::new();
        let mut depth = 1usize;
        let mut index = self.pos;
        let mut line_start = true;
        let end;
        loop {
            let token = &self.tokens[index];
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        end = index;
                        break;
                    }
                }
                TokenKind::Eof => {
                    end = index;
                    break;
                }
                TokenKind::Newline => {
                    line_start = true;
                    index += 1;
                    continue;
                }
                _ => {
                    if line_start {
                        lines.push(index);
                    }
                }
            }
            line_start = false;
            index += 1;
        }

        // Resolve lines in dependency order.
        let mut parsed: Vec<Option<Inst>> = vec![None; lines.len()];
        let mut pending: Vec<usize> = (0..lines.len()).collect();
        while !pending.is_empty() {
            let mut progress = false;
            let mut still_pending = Vec::new();
            for &line in &pending {
                self.pos = lines[line];
                match self.parse_inst(&mut builder, values, &blocks) {
                    Ok(inst) => {
                        parsed[line] = Some(inst);
                        progress = true;
                    }
                    Err(LineError::Undefined { .. }) => still_pending.push(line),
                    Err(err) => return Err(err.into_fatal()),
                }
            }
            if !progress {
                let line = lines[still_pending[0]];
                return Err(ParseError::new(
                    self.tokens[line].line,
                    "no acyclic order resolves these definitions",
                ));
            }
            pending = still_pending;
        }

        // Restore the textual order.
        let order: Vec<Inst> = parsed.into_iter().flatten().collect();
        builder.unit_mut().layout.flat_mut().reorder(order);
        self.pos = end;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Instructions
    // ------------------------------------------------------------------

    fn parse_inst(
        &mut self,
        builder: &mut UnitBuilder,
        values: &mut BTreeMap<String, Value>,
        blocks: &BTreeMap<String, Block>,
    ) -> Result<Inst, LineError> {
        let result_name = if self.at(TokenKind::PercentName) && self.peek_kind(1) == TokenKind::Eq
        {
            let token = self.bump();
            self.bump();
            if values.contains_key(&token.text) {
                return Err(ParseError::new(
                    token.line,
                    format!("redefinition of `%{}`", token.text),
                )
                .into());
            }
            Some(token)
        } else {
            None
        };

        let mnemonic = self.expect(TokenKind::Word, "an instruction mnemonic")?;
        let line = mnemonic.line;
        let inst = self.parse_operation(&mnemonic, builder, values, blocks)?;

        if let Some(name) = result_name {
            match builder.dfg().get_inst_result(inst) {
                Some(result) => {
                    values.insert(name.text.clone(), result);
                    if !is_numeric(&name.text) {
                        builder.dfg_mut().set_value_name(result, name.text);
                    }
                }
                None => {
                    return Err(ParseError::new(
                        line,
                        "instruction produces no result to name",
                    )
                    .into())
                }
            }
        }
        Ok(inst)
    }

    fn parse_operation(
        &mut self,
        mnemonic: &Token,
        builder: &mut UnitBuilder,
        values: &mut BTreeMap<String, Value>,
        blocks: &BTreeMap<String, Block>,
    ) -> Result<Inst, LineError> {
        let line = mnemonic.line;
        let build = |err: silica_ir::BuildError| -> LineError {
            ParseError::new(line, err.to_string()).into()
        };
        match mnemonic.text.as_str() {
            "const" => {
                let ty = self.parse_type()?;
                match ty {
                    Type::Int(width) => {
                        let negative = self.eat(TokenKind::Minus);
                        let token = self.expect(TokenKind::Number, "an integer literal")?;
                        let mut value: BigInt = token.text.parse().map_err(|_| {
                            ParseError::new(token.line, "invalid integer literal")
                        })?;
                        if negative {
                            value = -value;
                        }
                        let v = builder.ins().const_int(width, value).map_err(build)?;
                        Ok(self.def_of(builder, v))
                    }
                    Type::Logic(width) => {
                        let token = self.expect(TokenKind::Str, "a logic symbol string")?;
                        let imm = LogicVec::from_symbols(&token.text).ok_or_else(|| {
                            ParseError::new(token.line, "invalid logic symbols")
                        })?;
                        if imm.width() != width {
                            return Err(ParseError::new(
                                token.line,
                                format!(
                                    "logic constant has {} symbols, expected {width}",
                                    imm.width()
                                ),
                            )
                            .into());
                        }
                        let v = builder.ins().const_logic(imm).map_err(build)?;
                        Ok(self.def_of(builder, v))
                    }
                    Type::Time => {
                        let token = self.expect(TokenKind::TimeLit, "a duration")?;
                        let ps = TimeValue::parse_duration(&token.text).ok_or_else(|| {
                            ParseError::new(token.line, "invalid duration literal")
                        })?;
                        let delta = if self.at(TokenKind::TimeLit) {
                            let token = self.bump();
                            match token.text.strip_suffix('d') {
                                Some(digits) => digits.parse().map_err(|_| {
                                    ParseError::new(token.line, "invalid delta count")
                                })?,
                                None => {
                                    return Err(ParseError::new(
                                        token.line,
                                        "expected a `d`-suffixed delta count",
                                    )
                                    .into())
                                }
                            }
                        } else {
                            0
                        };
                        let v = builder
                            .ins()
                            .const_time(TimeValue::new(ps, delta))
                            .map_err(build)?;
                        Ok(self.def_of(builder, v))
                    }
                    other => Err(ParseError::new(
                        line,
                        format!("`const` cannot produce a `{other}`"),
                    )
                    .into()),
                }
            }
            "not" => {
                self.parse_type()?;
                let a = self.value(values)?;
                let v = builder.ins().not(a).map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            op @ ("add" | "sub" | "mul" | "udiv" | "sdiv" | "urem" | "srem" | "and" | "or"
            | "xor" | "shl" | "lshr" | "ashr" | "eq" | "ne" | "ult" | "ugt" | "ule" | "uge"
            | "slt" | "sgt" | "sle" | "sge") => {
                self.parse_type()?;
                let a = self.value(values)?;
                self.expect(TokenKind::Comma, "`,`")?;
                let b = self.value(values)?;
                let mut ins = builder.ins();
                let v = match op {
                    "add" => ins.add(a, b),
                    "sub" => ins.sub(a, b),
                    "mul" => ins.mul(a, b),
                    "udiv" => ins.udiv(a, b),
                    "sdiv" => ins.sdiv(a, b),
                    "urem" => ins.urem(a, b),
                    "srem" => ins.srem(a, b),
                    "and" => ins.and(a, b),
                    "or" => ins.or(a, b),
                    "xor" => ins.xor(a, b),
                    "shl" => ins.shl(a, b),
                    "lshr" => ins.lshr(a, b),
                    "ashr" => ins.ashr(a, b),
                    "eq" => ins.eq(a, b),
                    "ne" => ins.ne(a, b),
                    "ult" => ins.ult(a, b),
                    "ugt" => ins.ugt(a, b),
                    "ule" => ins.ule(a, b),
                    "uge" => ins.uge(a, b),
                    "slt" => ins.slt(a, b),
                    "sgt" => ins.sgt(a, b),
                    "sle" => ins.sle(a, b),
                    _ => ins.sge(a, b),
                }
                .map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "array" | "struct" => {
                let is_array = mnemonic.text == "array";
                self.parse_type()?;
                let mut elements = vec![self.value(values)?];
                while self.eat(TokenKind::Comma) {
                    elements.push(self.value(values)?);
                }
                let v = if is_array {
                    builder.ins().array(elements)
                } else {
                    builder.ins().strukt(elements)
                }
                .map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "mux" => {
                self.parse_type()?;
                let sel = self.value(values)?;
                self.expect(TokenKind::Comma, "`,`")?;
                let choices = self.value(values)?;
                let v = builder.ins().mux(sel, choices).map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "extract" => {
                self.parse_type()?;
                let target = self.value(values)?;
                self.expect(TokenKind::Comma, "`,`")?;
                let first = self.parse_number()?;
                let v = if self.eat(TokenKind::Comma) {
                    let length = self.parse_number()?;
                    builder.ins().extract_slice(target, first, length)
                } else {
                    builder.ins().extract_field(target, first)
                }
                .map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "insert" => {
                self.parse_type()?;
                let target = self.value(values)?;
                self.expect(TokenKind::Comma, "`,`")?;
                let first = self.parse_number()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let v = if self.at(TokenKind::Number) {
                    let length = self.parse_number()?;
                    self.expect(TokenKind::Comma, "`,`")?;
                    let value = self.value(values)?;
                    builder.ins().insert_slice(target, first, length, value)
                } else {
                    let value = self.value(values)?;
                    builder.ins().insert_field(target, first, value)
                }
                .map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "reg" => {
                self.parse_type()?;
                let data = self.value(values)?;
                self.expect(TokenKind::Comma, "`,`")?;
                let mode = self.parse_reg_mode()?;
                let trigger = self.value(values)?;
                let v = if self.eat(TokenKind::Comma) {
                    let avalue = self.value(values)?;
                    self.expect(TokenKind::Comma, "`,`")?;
                    let amode = self.parse_reg_mode()?;
                    let atrigger = self.value(values)?;
                    builder
                        .ins()
                        .reg_async(data, mode, trigger, avalue, amode, atrigger)
                } else {
                    builder.ins().reg(data, mode, trigger)
                }
                .map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "sig" => {
                let ty = self.parse_type()?;
                let v = builder.ins().sig(ty).map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "prb" => {
                self.parse_type()?;
                let signal = self.value(values)?;
                let v = builder.ins().prb(signal).map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "drv" => {
                self.parse_type()?;
                let signal = self.value(values)?;
                let gate = if self.at_word("if") {
                    self.bump();
                    Some(self.value(values)?)
                } else {
                    None
                };
                self.expect(TokenKind::Comma, "`,`")?;
                let value = self.value(values)?;
                self.expect(TokenKind::Comma, "`,`")?;
                let delay = self.value(values)?;
                match gate {
                    Some(gate) => builder
                        .ins()
                        .drv_cond(signal, value, delay, gate)
                        .map_err(build),
                    None => builder.ins().drv(signal, value, delay).map_err(build),
                }
            }
            "call" => {
                let ret = self.parse_type()?;
                let callee = self.expect(TokenKind::AtName, "a unit name")?;
                self.expect(TokenKind::LParen, "`(`")?;
                let args = self.value_list(values, TokenKind::RParen)?;
                self.expect(TokenKind::RParen, "`)`")?;
                let sig = Signature::new_function(
                    args.iter()
                        .map(|&v| builder.dfg().value_type(v).clone())
                        .collect(),
                    ret,
                );
                let ext = builder.dfg_mut().add_ext_unit(callee.text, sig);
                let v = builder.ins().call(ext, args).map_err(build)?;
                Ok(self.def_of(builder, v))
            }
            "inst" => {
                let callee = self.expect(TokenKind::AtName, "a unit name")?;
                self.expect(TokenKind::LParen, "`(`")?;
                let inputs = self.value_list(values, TokenKind::RParen)?;
                self.expect(TokenKind::RParen, "`)`")?;
                self.expect(TokenKind::Arrow, "`->`")?;
                self.expect(TokenKind::LParen, "`(`")?;
                let outputs = self.value_list(values, TokenKind::RParen)?;
                self.expect(TokenKind::RParen, "`)`")?;
                let sig = Signature::new_ports(
                    inputs
                        .iter()
                        .map(|&v| builder.dfg().value_type(v).clone())
                        .collect(),
                    outputs
                        .iter()
                        .map(|&v| builder.dfg().value_type(v).clone())
                        .collect(),
                );
                let ext = builder.dfg_mut().add_ext_unit(callee.text, sig);
                builder.ins().inst(ext, inputs, outputs).map_err(build)
            }
            "br" => {
                let first = self.expect(TokenKind::PercentName, "a target or condition")?;
                if self.eat(TokenKind::Comma) {
                    let cond = self.lookup(values, &first)?;
                    let taken1 = self.block_ref(blocks)?;
                    self.expect(TokenKind::Comma, "`,`")?;
                    let taken0 = self.block_ref(blocks)?;
                    builder.ins().br_cond(cond, taken1, taken0).map_err(build)
                } else {
                    let target = *blocks.get(&first.text).ok_or_else(|| {
                        ParseError::new(first.line, format!("unknown block `%{}`", first.text))
                    })?;
                    builder.ins().br(target).map_err(build)
                }
            }
            "ret" => {
                if self.at(TokenKind::Newline)
                    || self.at(TokenKind::RBrace)
                    || self.at(TokenKind::Eof)
                {
                    builder.ins().ret().map_err(build)
                } else {
                    self.parse_type()?;
                    let value = self.value(values)?;
                    builder.ins().ret_value(value).map_err(build)
                }
            }
            "wait" => {
                let target = self.block_ref(blocks)?;
                let time = if self.at_word("for") {
                    self.bump();
                    Some(self.value(values)?)
                } else {
                    None
                };
                let mut signals = Vec::new();
                while self.eat(TokenKind::Comma) {
                    signals.push(self.value(values)?);
                }
                match time {
                    Some(time) => builder.ins().wait_time(target, time, signals).map_err(build),
                    None => builder.ins().wait(target, signals).map_err(build),
                }
            }
            "halt" => builder.ins().halt().map_err(build),
            other => Err(ParseError::new(
                line,
                format!("unknown instruction `{other}`"),
            )
            .into()),
        }
    }

    fn at_word(&self, word: &str) -> bool {
        self.at(TokenKind::Word) && self.current().text == word
    }

    fn parse_reg_mode(&mut self) -> Result<silica_ir::RegMode, ParseError> {
        let token = self.expect(TokenKind::Word, "a register mode")?;
        silica_ir::RegMode::from_str(&token.text).ok_or_else(|| {
            ParseError::new(
                token.line,
                format!("unknown register mode `{}`", token.text),
            )
        })
    }

    fn def_of(&self, builder: &UnitBuilder, value: Value) -> Inst {
        builder
            .dfg()
            .get_value_inst(value)
            .expect("constructor results are instruction-defined")
    }

    fn value(&mut self, values: &BTreeMap<String, Value>) -> Result<Value, LineError> {
        let token = self.expect(TokenKind::PercentName, "a value")?;
        self.lookup(values, &token)
    }

    fn lookup(
        &self,
        values: &BTreeMap<String, Value>,
        token: &Token,
    ) -> Result<Value, LineError> {
        values.get(&token.text).copied().ok_or(LineError::Undefined {
            name: token.text.clone(),
            line: token.line,
        })
    }

    fn value_list(
        &mut self,
        values: &BTreeMap<String, Value>,
        until: TokenKind,
    ) -> Result<Vec<Value>, LineError> {
        let mut list = Vec::new();
        if !self.at(until) {
            loop {
                list.push(self.value(values)?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(list)
    }

    fn block_ref(&mut self, blocks: &BTreeMap<String, Block>) -> Result<Block, ParseError> {
        let token = self.expect(TokenKind::PercentName, "a block reference")?;
        blocks.get(&token.text).copied().ok_or_else(|| {
            ParseError::new(token.line, format!("unknown block `%{}`", token.text))
        })
    }
}

fn int_width(text: &str) -> Option<u32> {
    let digits = text.strip_prefix('i')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn logic_width(text: &str) -> Option<u32> {
    let digits = text.strip_prefix('n')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn is_numeric(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_ir::{Opcode, Verifier};

    fn verify_ok(module: &Module) {
        let mut verifier = Verifier::new();
        verifier.verify_module(module);
        verifier.finish().unwrap();
    }

    #[test]
    fn parses_simple_function() {
        let module = parse_module(
            "func @inc (i32 %x) i32 {\n\
             entry:\n\
             %one = const i32 1\n\
             %y = add i32 %x, %one\n\
             ret i32 %y\n\
             }\n",
        )
        .unwrap();
        let id = module.lookup("inc").unwrap();
        let unit = module.unit(id);
        assert_eq!(unit.kind(), UnitKind::Function);
        assert_eq!(unit.layout.all_insts().count(), 3);
        verify_ok(&module);
    }

    #[test]
    fn parses_branching_function_with_forward_block() {
        let module = parse_module(
            "func @pick (i1 %c) i32 {\n\
             entry:\n\
             br %c, %yes, %no\n\
             yes:\n\
             %a = const i32 1\n\
             ret i32 %a\n\
             no:\n\
             %b = const i32 0\n\
             ret i32 %b\n\
             }\n",
        )
        .unwrap();
        verify_ok(&module);
    }

    #[test]
    fn parses_process_with_wait() {
        let module = parse_module(
            "proc @follow (i8$ %a) -> (i8$ %q) {\n\
             entry:\n\
             %v = prb i8$ %a\n\
             %t = const time 0s 1d\n\
             drv i8$ %q, %v, %t\n\
             wait %entry, %a\n\
             }\n",
        )
        .unwrap();
        verify_ok(&module);
        let unit = module.unit(module.lookup("follow").unwrap());
        assert_eq!(unit.kind(), UnitKind::Process);
    }

    #[test]
    fn parses_entity_with_use_before_def() {
        // The drive textually precedes the value it consumes (S3).
        let module = parse_module(
            "entity @inv (i8$ %a) -> (i8$ %q) {\n\
             drv i8$ %q, %n, %t\n\
             %n = not i8 %v\n\
             %v = prb i8$ %a\n\
             %t = const time 0s 1d\n\
             }\n",
        )
        .unwrap();
        verify_ok(&module);
        let unit = module.unit(module.lookup("inv").unwrap());
        // Textual order is preserved in the layout.
        let first = unit.layout.flat().insts().next().unwrap();
        assert_eq!(unit.dfg[first].opcode(), Opcode::Drv);
    }

    #[test]
    fn entity_with_true_cycle_is_rejected() {
        let err = parse_module(
            "entity @loop (i8$ %a) -> (i8$ %q) {\n\
             %x = not i8 %y\n\
             %y = not i8 %x\n\
             }\n",
        )
        .unwrap_err();
        assert!(err.message.contains("no acyclic order"));
    }

    #[test]
    fn parses_declarations() {
        let module = parse_module(
            "decl @ext_func (i32, i32) i32\n\
             decl @ext_ent (i1$) -> (i8$)\n",
        )
        .unwrap();
        assert!(module.lookup("ext_func").is_some());
        assert!(module.lookup("ext_ent").is_some());
    }

    #[test]
    fn parses_entity_with_instantiation() {
        let module = parse_module(
            "entity @sub (i1$ %a) -> (i1$ %b) {\n\
             %v = prb i1$ %a\n\
             %t = const time 0s 1d\n\
             drv i1$ %b, %v, %t\n\
             }\n\
             \n\
             entity @top (i1$ %x) -> (i1$ %y) {\n\
             inst @sub (%x) -> (%y)\n\
             }\n",
        )
        .unwrap();
        verify_ok(&module);
    }

    #[test]
    fn parses_reg_with_async_override() {
        let module = parse_module(
            "entity @ff (i1$ %clk, i1$ %rst_n, i8$ %d) -> (i8$ %q) {\n\
             %clkv = prb i1$ %clk\n\
             %rstv = prb i1$ %rst_n\n\
             %dv = prb i8$ %d\n\
             %zero = const i8 0\n\
             %r = reg i8 %dv, rise %clkv, %zero, low %rstv\n\
             %t = const time 0s 1d\n\
             drv i8$ %q, %r, %t\n\
             }\n",
        )
        .unwrap();
        verify_ok(&module);
    }

    #[test]
    fn rejects_type_errors_at_construction() {
        let err = parse_module(
            "func @bad () i32 {\n\
             entry:\n\
             %a = const i8 1\n\
             %b = const i32 2\n\
             %c = add i32 %a, %b\n\
             ret i32 %c\n\
             }\n",
        )
        .unwrap_err();
        assert!(err.message.contains("matching types"), "{}", err.message);
        assert_eq!(err.line, 5);
    }

    #[test]
    fn rejects_undefined_value_in_cfg() {
        let err = parse_module(
            "func @bad () i32 {\n\
             entry:\n\
             ret i32 %ghost\n\
             }\n",
        )
        .unwrap_err();
        assert!(err.message.contains("undefined value"));
    }

    #[test]
    fn rejects_duplicate_unit_names() {
        let err = parse_module(
            "decl @x () i32\n\
             decl @x () i32\n",
        )
        .unwrap_err();
        assert!(err.message.contains("already exists"));
    }

    #[test]
    fn parses_negative_and_wide_constants() {
        let module = parse_module(
            "func @k () i8 {\n\
             entry:\n\
             %a = const i8 -1\n\
             ret i8 %a\n\
             }\n",
        )
        .unwrap();
        let unit = module.unit(module.lookup("k").unwrap());
        let konst = unit.layout.all_insts().next().unwrap();
        assert_eq!(
            unit.dfg[konst].get_const_int().unwrap().to_u64(),
            Some(0xff)
        );
    }

    #[test]
    fn parses_wait_with_timeout() {
        let module = parse_module(
            "proc @tick (i1$ %clk) -> (i1$ %q) {\n\
             entry:\n\
             %v = prb i1$ %clk\n\
             %t0 = const time 0s 1d\n\
             drv i1$ %q, %v, %t0\n\
             %t = const time 10ns\n\
             wait %entry for %t, %clk\n\
             }\n",
        )
        .unwrap();
        verify_ok(&module);
    }
}
