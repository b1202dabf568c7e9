//! Rule text parser.
//!
//! Recursive descent over the statement form
//! `{buy|sell} {shares} {symbol} when price {>|<} {threshold}`, with
//! multiple statements separated by `;`. Errors carry the character
//! offset into the full input for caret rendering. Symbols are folded
//! to uppercase; keywords are lowercase and case-sensitive.

use crate::domain::error::ParseError;
use crate::domain::rule::{Condition, RuleAction, TradeRule};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && (remaining.len() == keyword.len()
                || !remaining[keyword.len()..]
                    .chars()
                    .next()
                    .map(|c| c.is_alphanumeric() || c == '_')
                    .unwrap_or(false))
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(ParseError {
                message: format!("expected '{}', found '{}'", keyword, found),
                position: self.pos,
            })
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_shares(&mut self) -> Result<i64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected share count".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        let shares = num_str.parse::<i64>().map_err(|_| ParseError {
            message: format!("invalid share count: {}", num_str),
            position: start,
        })?;
        if shares == 0 {
            return Err(ParseError {
                message: "share count must be positive".to_string(),
                position: start,
            });
        }
        Ok(shares)
    }

    fn parse_symbol(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        if !self.peek().is_some_and(|ch| ch.is_ascii_alphabetic()) {
            let found = self.peek_word();
            return Err(ParseError {
                message: format!("expected symbol, found '{}'", found),
                position: self.pos,
            });
        }

        let mut symbol = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '.' {
                symbol.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Ok(symbol.to_uppercase())
    }

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('>') => {
                self.advance();
                Ok(Condition::GreaterThan)
            }
            Some('<') => {
                self.advance();
                Ok(Condition::LessThan)
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '>' or '<', found '{}'", ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: "expected '>' or '<', found end of input".to_string(),
                position: self.pos,
            }),
        }
    }

    fn parse_statement(&mut self) -> Result<TradeRule, ParseError> {
        self.skip_whitespace();
        let action = if self.consume_keyword("buy") {
            RuleAction::Buy
        } else if self.consume_keyword("sell") {
            RuleAction::Sell
        } else {
            let found = self.peek_word();
            return Err(ParseError {
                message: format!("expected 'buy' or 'sell', found '{}'", found),
                position: self.pos,
            });
        };

        let shares = self.parse_shares()?;
        let symbol = self.parse_symbol()?;

        self.skip_whitespace();
        self.expect_keyword("when")?;
        self.skip_whitespace();
        self.expect_keyword("price")?;

        let condition = self.parse_condition()?;
        let threshold = self.parse_number()?;

        Ok(TradeRule {
            symbol,
            action,
            condition,
            threshold,
            shares,
        })
    }

    fn parse(&mut self) -> Result<Vec<TradeRule>, ParseError> {
        let mut rules = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek().is_none() {
                break;
            }
            rules.push(self.parse_statement()?);

            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(';') => {
                    self.advance();
                }
                Some(_) => {
                    let found = self.peek_word();
                    return Err(ParseError {
                        message: format!("expected ';' or end of input, found '{}'", found),
                        position: self.pos,
                    });
                }
            }
        }
        Ok(rules)
    }
}

/// Parse `;`-separated rule statements. Empty or all-whitespace input
/// parses to no rules.
pub fn parse_rules(input: &str) -> Result<Vec<TradeRule>, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
