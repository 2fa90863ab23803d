//! Parser for the patch language.
//!
//! Recursive descent with one function per precedence level:
//!
//! ```text
//! program    := { statement }
//! statement  := identifier '=' expression | expression
//! expression := term (('+'|'-') term)*
//! term       := factor (('*'|'/'|'%') factor)*
//! factor     := ['-'] primary ['^' factor]
//! primary    := number | identifier | call | '(' expression ')'
//! call       := name '(' expression (',' expression)* ')'
//! ```
//!
//! The first grammar violation ends the parse. There is no resynchronisation.
//!
//! Parsing and code generation recurse once per level of the syntax tree, so
//! every statement's tree is bounded: at most [`MAX_NESTING`] levels of
//! parentheses, calls, negation and `^`, and at most [`MAX_EXPRESSION_NODES`]
//! nodes. Both limits sit well above the default operand-stack capacity.

use super::ast::*;
use super::error::CompileError;
use super::token::{Token, TokenKind};

/// A failed parse: the error plus every statement completed before it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub error: CompileError,
    pub partial: Vec<Statement>,
}

impl From<ParseFailure> for CompileError {
    fn from(failure: ParseFailure) -> Self {
        failure.error
    }
}

/// Deepest accepted nesting of parentheses, calls, negation and `^`.
pub const MAX_NESTING: usize = 4096;

/// Largest accepted syntax tree for a single statement.
pub const MAX_EXPRESSION_NODES: usize = 65_536;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    nodes: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            nodes: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Vec<Statement>, ParseFailure> {
        let mut statements = Vec::new();

        loop {
            self.skip_separators();
            if self.is_at_end() {
                break;
            }

            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    return Err(ParseFailure {
                        error,
                        partial: statements,
                    })
                }
            }
        }

        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, CompileError> {
        self.nodes = 0;
        let statement = match (&self.peek().kind, self.peek_next_kind()) {
            (TokenKind::Ident(name), Some(TokenKind::Eq)) => {
                let target = name.clone();
                let pos = self.token_pos();
                self.advance(); // identifier
                self.advance(); // '='
                let value = self.parse_expression()?;
                Statement::Assign { target, value, pos }
            }
            (TokenKind::Function(f), Some(TokenKind::Eq)) => {
                let t = self.peek();
                return Err(CompileError::parse(
                    format!("cannot assign to built-in function '{}'", f.name()),
                    t.line,
                    t.col,
                ));
            }
            _ => Statement::Expr(self.parse_expression()?),
        };

        match self.peek().kind {
            TokenKind::Separator | TokenKind::Eof => Ok(statement),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_term()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let pos = self.token_pos();
            self.count_node()?;
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_factor()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            let pos = self.token_pos();
            self.count_node()?;
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }

        Ok(left)
    }

    /// Unary minus binds tighter than `^`, and `^` is right-associative:
    /// `-a^b^c` is `(-a)^(b^c)`.
    fn parse_factor(&mut self) -> Result<Expr, CompileError> {
        let base = if self.check(&TokenKind::Minus) {
            let pos = self.token_pos();
            self.count_node()?;
            self.advance();
            let operand = self.nested(Self::parse_primary)?;
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
                pos,
            }
        } else {
            self.parse_primary()?
        };

        if self.check(&TokenKind::Caret) {
            let pos = self.token_pos();
            self.count_node()?;
            self.advance();
            let exponent = self.nested(Self::parse_factor)?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
                pos,
            });
        }

        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let pos = self.token_pos();
        match self.peek().kind.clone() {
            TokenKind::Number(value) => {
                self.count_node()?;
                self.advance();
                Ok(Expr::Literal { value, pos })
            }
            TokenKind::Ident(name) => {
                self.count_node()?;
                self.advance();
                if self.check(&TokenKind::LParen) {
                    // Unknown names are rejected by the compiler, never
                    // silently read as variables.
                    self.parse_call(name, pos)
                } else {
                    Ok(Expr::Variable { name, pos })
                }
            }
            TokenKind::Function(f) => {
                self.count_node()?;
                self.advance();
                if !self.check(&TokenKind::LParen) {
                    return Err(self.unexpected(&format!("'(' after '{}'", f.name())));
                }
                self.parse_call(f.name().to_string(), pos)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.nested(Self::parse_expression)?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_call(&mut self, name: String, pos: Pos) -> Result<Expr, CompileError> {
        self.expect(TokenKind::LParen)?;

        let args = self.nested(|parser| {
            let mut args = vec![parser.parse_expression()?];
            while parser.check(&TokenKind::Comma) {
                parser.advance();
                args.push(parser.parse_expression()?);
            }
            Ok(args)
        })?;

        self.expect(TokenKind::RParen)?;
        Ok(Expr::Call { name, args, pos })
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        if self.depth >= MAX_NESTING {
            let t = self.peek();
            return Err(CompileError::parse(
                format!("expression nested too deeply (limit {MAX_NESTING})"),
                t.line,
                t.col,
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn count_node(&mut self) -> Result<(), CompileError> {
        self.nodes += 1;
        if self.nodes > MAX_EXPRESSION_NODES {
            let t = self.peek();
            return Err(CompileError::parse(
                format!("statement too large (limit {MAX_EXPRESSION_NODES} terms)"),
                t.line,
                t.col,
            ));
        }
        Ok(())
    }

    // --- Helpers ---

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_next_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|t| &t.kind)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn is_at_end(&self) -> bool {
        self.tokens.is_empty() || self.check(&TokenKind::Eof)
    }

    fn skip_separators(&mut self) {
        while !self.tokens.is_empty() && self.check(&TokenKind::Separator) {
            self.advance();
        }
    }

    fn token_pos(&self) -> Pos {
        self.tokens
            .get(self.pos)
            .map(|t| Pos {
                line: t.line,
                col: t.col,
            })
            .unwrap_or_default()
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), CompileError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let t = self.peek();
        CompileError::parse(
            format!("expected {expected}, got {}", t.kind.describe()),
            t.line,
            t.col,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;
    use crate::dsl::lexer::Lexer;
    use crate::dsl::on_compiler_stack;

    fn parse(src: &str) -> Result<Vec<Statement>, ParseFailure> {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse()
    }

    /// Strip positions so trees can be compared structurally.
    fn shape(expr: &Expr) -> String {
        match expr {
            Expr::Literal { value, .. } => format!("{value}"),
            Expr::Variable { name, .. } => name.clone(),
            Expr::Unary { operand, .. } => format!("(neg {})", shape(operand)),
            Expr::Binary {
                op, left, right, ..
            } => format!("({} {} {})", op.symbol(), shape(left), shape(right)),
            Expr::Call { name, args, .. } => {
                let args: Vec<String> = args.iter().map(shape).collect();
                format!("({name} {})", args.join(" "))
            }
        }
    }

    fn expr_shape(src: &str) -> String {
        match &parse(src).unwrap()[0] {
            Statement::Expr(e) => shape(e),
            Statement::Assign { value, .. } => shape(value),
        }
    }

    #[test]
    fn parse_empty_program() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n\n;;\n").unwrap().is_empty());
    }

    #[test]
    fn parse_assignment() {
        let statements = parse("outl = inl").unwrap();
        assert_eq!(statements.len(), 1);
        match &statements[0] {
            Statement::Assign { target, value, pos } => {
                assert_eq!(target, "outl");
                assert_eq!(shape(value), "inl");
                assert_eq!(*pos, Pos { line: 1, col: 1 });
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn parse_bare_expression() {
        let statements = parse("sin(x)").unwrap();
        assert!(matches!(statements[0], Statement::Expr(Expr::Call { .. })));
    }

    #[test]
    fn additive_is_left_associative() {
        assert_eq!(expr_shape("a - b - c"), "(- (- a b) c)");
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(expr_shape("a + b * c"), "(+ a (* b c))");
        assert_eq!(expr_shape("a * b + c"), "(+ (* a b) c)");
        assert_eq!(expr_shape("a % b - c"), "(- (% a b) c)");
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(expr_shape("a ^ b ^ c"), "(^ a (^ b c))");
        assert_eq!(expr_shape("a * b ^ c"), "(* a (^ b c))");
    }

    #[test]
    fn unary_minus_binds_tighter_than_power() {
        assert_eq!(expr_shape("-a ^ 2"), "(^ (neg a) 2)");
        assert_eq!(expr_shape("2 ^ -a"), "(^ 2 (neg a))");
        assert_eq!(expr_shape("a - -b"), "(- a (neg b))");
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(expr_shape("(a + b) * c"), "(* (+ a b) c)");
    }

    #[test]
    fn parse_calls() {
        assert_eq!(expr_shape("pow(a, 2)"), "(pow a 2)");
        assert_eq!(expr_shape("sin1(0.25 * t)"), "(sin1 (* 0.25 t))");
        assert_eq!(
            expr_shape("biquad(in, 1, 0, 0, 0, 0)"),
            "(biquad in 1 0 0 0 0)"
        );
    }

    #[test]
    fn unknown_call_parses_as_call() {
        assert_eq!(expr_shape("foo(1)"), "(foo 1)");
    }

    #[test]
    fn multiple_statements() {
        let statements = parse("a = 1\nb = a + 1; out = b\n").unwrap();
        assert_eq!(statements.len(), 3);
    }

    #[test]
    fn error_reports_offending_token() {
        let failure = parse("out = (1 + 2").unwrap_err();
        assert_eq!(failure.error.kind, ErrorKind::ParseError);
        assert_eq!((failure.error.line, failure.error.col), (1, 13));
        assert!(failure.error.message.contains("')'"));
    }

    #[test]
    fn error_keeps_partial_statements() {
        let failure = parse("a = 1\nb = 2\nc = * 3\nd = 4").unwrap_err();
        assert_eq!(failure.partial.len(), 2);
        assert_eq!((failure.error.line, failure.error.col), (3, 5));
    }

    #[test]
    fn statements_need_separators() {
        let failure = parse("a = 1 b = 2").unwrap_err();
        assert_eq!((failure.error.line, failure.error.col), (1, 7));
        assert_eq!(failure.partial.len(), 0);
    }

    #[test]
    fn function_name_needs_arguments() {
        assert!(parse("out = sin").is_err());
        assert!(parse("out = sin()").is_err());
    }

    #[test]
    fn cannot_assign_to_function() {
        let failure = parse("sin = 1").unwrap_err();
        assert!(failure.error.message.contains("sin"));
    }

    #[test]
    fn dump_is_indented() {
        let statements = parse("out = -x * 2").unwrap();
        let text = dump(&statements);
        assert_eq!(
            text,
            "Assign out\n  Binary '*'\n    Negate\n      Variable x\n    Literal 2\n"
        );
    }

    /// Deep trees need the compiler's stack to build and drop, so only the
    /// statement count comes back.
    fn parse_deep(src: String) -> Result<usize, ParseFailure> {
        on_compiler_stack(move || Ok(parse(&src).map(|statements| statements.len())))
            .unwrap()
    }

    #[test]
    fn nesting_at_the_limit_parses() {
        let open = "(".repeat(MAX_NESTING);
        let close = ")".repeat(MAX_NESTING);
        assert!(parse_deep(format!("{open}1{close}")).is_ok());

        let failure = parse_deep(format!("({open}1{close})")).unwrap_err();
        assert_eq!(failure.error.kind, ErrorKind::ParseError);
        assert!(failure.error.message.contains("nested too deeply"));
        assert_eq!((failure.error.line, failure.error.col), (1, MAX_NESTING + 2));
    }

    #[test]
    fn calls_and_powers_count_as_nesting() {
        let depth = MAX_NESTING + 1;
        let calls = format!("{}1{}", "abs(".repeat(depth), ")".repeat(depth));
        assert!(parse_deep(calls).is_err());

        let powers = format!("{}2", "2 ^ ".repeat(depth));
        assert!(parse_deep(powers).is_err());
    }

    #[test]
    fn long_chains_are_bounded() {
        let src = format!("a = 1\nout = {}1", "1 + ".repeat(MAX_EXPRESSION_NODES));
        let failure = parse_deep(src).unwrap_err();
        assert!(failure.error.message.contains("too large"));
        assert_eq!(failure.partial.len(), 1);
    }

    #[test]
    fn node_budget_is_per_statement() {
        let half = "1 + ".repeat(MAX_EXPRESSION_NODES / 4);
        let src = format!("a = {half}1\nb = {half}1\nc = {half}1");
        assert_eq!(parse_deep(src).unwrap(), 3);
    }

    #[test]
    fn parse_failure_converts_to_compile_error() {
        let failure = parse(")").unwrap_err();
        let err: CompileError = failure.into();
        assert_eq!(err.kind, ErrorKind::ParseError);
    }
}
