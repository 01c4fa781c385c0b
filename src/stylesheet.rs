//! Owned CSS rule tree
//!
//! Tokenization is delegated to the `cssparser` crate; this module only
//! assembles the tokens into an owned rule tree the rewrite pass can mutate,
//! and serializes the tree back to text. Preludes and declaration values are
//! captured as raw source slices, so arbitrary value syntax (multi-layer
//! backgrounds, `image-set(...)`, vendor hacks behind a leading `*`) survives
//! a round trip unchanged.
//!
//! Serialization is deterministic: the same tree always prints the same
//! bytes, which is what makes a second pipeline run over its own output
//! byte-stable. Comments are not preserved.

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use thiserror::Error;

/// Stable identity of a rule within one parsed stylesheet.
///
/// The rewrite pass keys its "already rewritten" side-table on this, instead
/// of stashing flags on the tree itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(usize);

/// One `property: value` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self { property: property.into(), value: value.into() }
    }
}

/// One rule: a prelude (selector list or at-rule header), declarations, and
/// nested rules (e.g. the contents of an `@media` block). Block-less at-rules
/// such as `@import` are kept as statements.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    pub prelude: String,
    pub declarations: Vec<Declaration>,
    pub rules: Vec<Rule>,
    statement: bool,
}

impl Rule {
    /// The comma-separated selector list, trimmed. Empty for at-rules taken
    /// as a whole prelude.
    pub fn selectors(&self) -> Vec<String> {
        if self.is_at_rule() {
            return Vec::new();
        }
        self.prelude
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn is_at_rule(&self) -> bool {
        self.prelude.starts_with('@')
    }
}

/// A parsed stylesheet.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

/// Parse failure; the caller leaves the source file untouched.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CssParseError {
    pub message: String,
}

struct IdGen {
    next: usize,
}

impl IdGen {
    fn next_id(&mut self) -> RuleId {
        let id = RuleId(self.next);
        self.next += 1;
        id
    }
}

enum Terminator {
    Block,
    Statement,
    Eof,
}

impl Stylesheet {
    pub fn parse(text: &str) -> Result<Self, CssParseError> {
        let mut input = ParserInput::new(text);
        let mut parser = Parser::new(&mut input);
        let mut ids = IdGen { next: 0 };
        let rules = parse_rule_list(&mut parser, &mut ids)
            .map_err(|e| CssParseError { message: format!("{:?}", e) })?;
        Ok(Stylesheet { rules })
    }

    /// Serialize back to CSS text.
    pub fn to_css(&self) -> String {
        let mut out = String::new();
        write_rules(&mut out, &self.rules, 0);
        out
    }
}

fn parse_rule_list<'i>(
    p: &mut Parser<'i, '_>,
    ids: &mut IdGen,
) -> Result<Vec<Rule>, ParseError<'i, ()>> {
    let mut rules = Vec::new();
    loop {
        p.skip_whitespace();
        if p.is_exhausted() {
            break;
        }
        if let Some(rule) = parse_rule(p, ids)? {
            rules.push(rule);
        }
    }
    Ok(rules)
}

/// Parse one rule starting at the current position. Returns `None` for
/// stray semicolons and clean end-of-input.
fn parse_rule<'i>(
    p: &mut Parser<'i, '_>,
    ids: &mut IdGen,
) -> Result<Option<Rule>, ParseError<'i, ()>> {
    let prelude_start = p.position();
    let mut prelude_end = p.position();
    let terminator;
    loop {
        let before = p.position();
        let token = match p.next() {
            Ok(t) => Some(t.clone()),
            Err(_) => None,
        };
        match token {
            Some(Token::CurlyBracketBlock) => {
                prelude_end = before;
                terminator = Terminator::Block;
                break;
            }
            Some(Token::Semicolon) => {
                prelude_end = before;
                terminator = Terminator::Statement;
                break;
            }
            Some(_) => {
                // Nested blocks inside the prelude (e.g. `:not(...)`) are
                // skipped implicitly by the tokenizer.
                prelude_end = p.position();
            }
            None => {
                terminator = Terminator::Eof;
                break;
            }
        }
    }

    let prelude = p.slice(prelude_start..prelude_end).trim().to_string();
    match terminator {
        Terminator::Block => {
            let id = ids.next_id();
            let (declarations, rules) = p.parse_nested_block(|p| parse_block(p, ids))?;
            Ok(Some(Rule { id, prelude, declarations, rules, statement: false }))
        }
        Terminator::Statement => {
            if prelude.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Rule {
                    id: ids.next_id(),
                    prelude,
                    declarations: Vec::new(),
                    rules: Vec::new(),
                    statement: true,
                }))
            }
        }
        Terminator::Eof => {
            if prelude.is_empty() {
                Ok(None)
            } else {
                // Unterminated rule
                Err(p.new_custom_error(()))
            }
        }
    }
}

/// Parse the contents of a `{}` block: declarations interleaved with nested
/// rules.
fn parse_block<'i>(
    p: &mut Parser<'i, '_>,
    ids: &mut IdGen,
) -> Result<(Vec<Declaration>, Vec<Rule>), ParseError<'i, ()>> {
    let mut declarations = Vec::new();
    let mut rules = Vec::new();
    loop {
        p.skip_whitespace();
        if p.is_exhausted() {
            break;
        }
        if let Ok(decl) = p.try_parse(|p| parse_declaration(p)) {
            declarations.push(decl);
            continue;
        }
        if let Some(rule) = parse_rule(p, ids)? {
            rules.push(rule);
        }
    }
    Ok((declarations, rules))
}

fn parse_declaration<'i>(p: &mut Parser<'i, '_>) -> Result<Declaration, ParseError<'i, ()>> {
    let property = p.expect_ident()?.as_ref().to_string();
    let token = p.next()?.clone();
    if token != Token::Colon {
        return Err(p.new_custom_error(()));
    }
    p.skip_whitespace();
    let start = p.position();
    p.parse_until_before(Delimiter::Semicolon | Delimiter::CurlyBracketBlock, |p| {
        while p.next().is_ok() {}
        Ok::<(), ParseError<'i, ()>>(())
    })?;
    let value = p.slice_from(start).trim().to_string();

    let next = match p.next() {
        Ok(t) => Some(t.clone()),
        Err(_) => None,
    };
    match next {
        // A trailing `{` means the "declaration" was really a rule prelude
        // like `a:hover`; fail so the caller reparses it as a rule.
        Some(Token::CurlyBracketBlock) => Err(p.new_custom_error(())),
        Some(Token::Semicolon) | None => Ok(Declaration { property, value }),
        Some(_) => Err(p.new_custom_error(())),
    }
}

fn write_rules(out: &mut String, rules: &[Rule], depth: usize) {
    let indent = "  ".repeat(depth);
    for rule in rules {
        if rule.statement {
            out.push_str(&indent);
            out.push_str(&rule.prelude);
            out.push_str(";\n");
            continue;
        }

        out.push_str(&indent);
        if rule.is_at_rule() {
            out.push_str(&rule.prelude);
        } else {
            let selectors = rule.selectors();
            if selectors.is_empty() {
                out.push_str(&rule.prelude);
            } else {
                out.push_str(&selectors.join(&format!(",\n{}", indent)));
            }
        }
        out.push_str(" {\n");

        for decl in &rule.declarations {
            out.push_str(&indent);
            out.push_str("  ");
            out.push_str(&decl.property);
            out.push_str(": ");
            out.push_str(&decl.value);
            out.push_str(";\n");
        }
        write_rules(out, &rule.rules, depth + 1);
        out.push_str(&indent);
        out.push_str("}\n");
    }
}
