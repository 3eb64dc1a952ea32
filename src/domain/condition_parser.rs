//! Condition and rule-list DSL parser.
//!
//! Recursive descent over the text forms used in strategy and screener
//! configs. Errors carry the character offset and the expected/found token.
//!
//! ```text
//! ALL(GTE(score, 60), MARKET(US, HK), TAGS(ANY(volume_surge), NONE(high_volatility)))
//! BASE_SCORE(60), PRICE_RETURN(40, {"days": 5, "min": 0.01})
//! ```

use crate::domain::condition::{CategoryField, Comparison, Condition, ConditionSet, Logic};
use crate::domain::error::ParseError;
use crate::domain::scoring::{RuleKind, ScoringRule};
use crate::domain::snapshot::{NumericField, Tag};

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

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.input.len()
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    /// Consume `)` if it is next. Used to close variadic lists.
    fn close_paren(&mut self) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            true
        } else {
            false
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
        self.skip_whitespace();
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(self.error(format!("expected '{}', found '{}'", keyword, found)))
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

    fn parse_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error(format!("expected {}, found '{}'", what, self.peek_word())));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// A bare list value: everything up to the next `,` or `)`, trimmed.
    fn parse_value(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == ',' || ch == ')' || ch == '(' {
                break;
            }
            self.advance();
        }
        let value = self.input[start..self.pos].trim();
        if value.is_empty() {
            return Err(ParseError {
                message: format!("expected value, found '{}'", self.peek_word()),
                position: start,
            });
        }
        Ok(value.to_string())
    }

    fn parse_value_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut values = vec![self.parse_value()?];
        while !self.close_paren() {
            self.expect_char(',')?;
            values.push(self.parse_value()?);
        }
        Ok(values)
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

    fn parse_tag(&mut self) -> Result<Tag, ParseError> {
        Ok(Tag::from_name(&self.parse_identifier("tag")?))
    }

    fn parse_tag_list(&mut self) -> Result<Vec<Tag>, ParseError> {
        self.expect_char('(')?;
        let mut tags = vec![self.parse_tag()?];
        while !self.close_paren() {
            self.expect_char(',')?;
            tags.push(self.parse_tag()?);
        }
        Ok(tags)
    }

    fn parse_comparison(
        &mut self,
        keyword: &str,
        make: fn(f64) -> Comparison,
    ) -> Result<Condition, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let field = NumericField::from_name(&self.parse_identifier("field name")?);
        self.expect_char(',')?;
        let value = self.parse_number()?;
        self.expect_char(')')?;
        Ok(Condition::Numeric {
            field,
            cmp: make(value),
        })
    }

    fn parse_between(&mut self) -> Result<Condition, ParseError> {
        self.expect_keyword("BETWEEN")?;
        self.expect_char('(')?;
        let field = NumericField::from_name(&self.parse_identifier("field name")?);
        self.expect_char(',')?;
        let min = self.parse_number()?;
        self.expect_char(',')?;
        let max = self.parse_number()?;
        self.expect_char(')')?;
        Ok(Condition::Numeric {
            field,
            cmp: Comparison::Between { min, max },
        })
    }

    fn parse_category(&mut self, keyword: &str) -> Result<Condition, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let field = match keyword {
            "MARKET" => CategoryField::Market,
            "INDUSTRY" => CategoryField::Industry,
            _ => {
                let name = self.parse_identifier("category field")?;
                self.expect_char(',')?;
                CategoryField::from_name(&name)
            }
        };
        let values = self.parse_value_list()?;
        Ok(Condition::Category { field, values })
    }

    fn parse_tags(&mut self) -> Result<Condition, ParseError> {
        self.expect_keyword("TAGS")?;
        self.expect_char('(')?;

        let mut include_any = Vec::new();
        let mut include_all = Vec::new();
        let mut exclude_any = Vec::new();

        loop {
            self.skip_whitespace();
            if self.consume_keyword("ANY") {
                include_any.extend(self.parse_tag_list()?);
            } else if self.consume_keyword("ALL") {
                include_all.extend(self.parse_tag_list()?);
            } else if self.consume_keyword("NONE") {
                exclude_any.extend(self.parse_tag_list()?);
            } else {
                let found = self.peek_word();
                return Err(self.error(format!("expected ANY, ALL or NONE, found '{}'", found)));
            }
            if self.close_paren() {
                break;
            }
            self.expect_char(',')?;
        }

        Ok(Condition::Tags {
            include_any,
            include_all,
            exclude_any,
        })
    }

    fn parse_symbols(&mut self) -> Result<Condition, ParseError> {
        self.expect_keyword("SYMBOLS")?;
        self.expect_char('(')?;

        let mut include = Vec::new();
        let mut exclude = Vec::new();

        loop {
            self.skip_whitespace();
            if self.consume_keyword("INCLUDE") {
                self.expect_char('(')?;
                include.extend(self.parse_value_list()?);
            } else if self.consume_keyword("EXCLUDE") {
                self.expect_char('(')?;
                exclude.extend(self.parse_value_list()?);
            } else {
                let found = self.peek_word();
                return Err(self.error(format!("expected INCLUDE or EXCLUDE, found '{}'", found)));
            }
            if self.close_paren() {
                break;
            }
            self.expect_char(',')?;
        }

        Ok(Condition::Symbols { include, exclude })
    }

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        self.skip_whitespace();

        let comparisons: [(&str, fn(f64) -> Comparison); 4] = [
            ("GTE", Comparison::Gte),
            ("GT", Comparison::Gt),
            ("LTE", Comparison::Lte),
            ("LT", Comparison::Lt),
        ];
        for (keyword, make) in comparisons {
            if self.peek_keyword(keyword) {
                return self.parse_comparison(keyword, make);
            }
        }
        if self.peek_keyword("BETWEEN") {
            return self.parse_between();
        }
        for keyword in ["MARKET", "INDUSTRY", "CATEGORY"] {
            if self.peek_keyword(keyword) {
                return self.parse_category(keyword);
            }
        }
        if self.peek_keyword("TAGS") {
            return self.parse_tags();
        }
        if self.peek_keyword("SYMBOLS") {
            return self.parse_symbols();
        }

        let word = self.peek_word();
        Err(self.error(format!("expected condition, found '{}'", word)))
    }

    fn parse_group(&mut self, keyword: &str, logic: Logic) -> Result<ConditionSet, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut conditions = Vec::new();
        if self.close_paren() {
            return Ok(ConditionSet::new(logic, conditions));
        }
        conditions.push(self.parse_condition()?);
        while !self.close_paren() {
            self.expect_char(',')?;
            conditions.push(self.parse_condition()?);
        }
        Ok(ConditionSet::new(logic, conditions))
    }

    fn parse_set(&mut self) -> Result<ConditionSet, ParseError> {
        self.skip_whitespace();
        let set = if self.peek_keyword("ALL") {
            self.parse_group("ALL", Logic::And)?
        } else if self.peek_keyword("ANY") {
            self.parse_group("ANY", Logic::Or)?
        } else {
            ConditionSet::all(vec![self.parse_condition()?])
        };

        if !self.at_end() {
            return Err(self.error(format!(
                "unexpected input after condition: '{}'",
                self.remaining()
            )));
        }
        Ok(set)
    }

    /// Raw JSON object text, matched by brace depth; string contents are skipped.
    fn parse_json_object(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() != Some('{') {
            return Err(self.error(format!("expected '{{', found '{}'", self.peek_word())));
        }

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        while let Some(ch) = self.advance() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_string = false;
                }
                continue;
            }
            match ch {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.input[start..self.pos].to_string());
                    }
                }
                _ => {}
            }
        }

        Err(ParseError {
            message: "unterminated params object".to_string(),
            position: start,
        })
    }

    fn parse_rule(&mut self, kind: RuleKind) -> Result<ScoringRule, ParseError> {
        let condition_type = self.parse_identifier("condition type")?;
        self.expect_char('(')?;
        let weight = self.parse_number()?;
        let params = if self.close_paren() {
            String::new()
        } else {
            self.expect_char(',')?;
            let params = self.parse_json_object()?;
            self.expect_char(')')?;
            params
        };
        Ok(ScoringRule {
            condition_type,
            params,
            weight,
            kind,
        })
    }

    fn parse_rules(&mut self, kind: RuleKind) -> Result<Vec<ScoringRule>, ParseError> {
        let mut rules = Vec::new();
        if self.at_end() {
            return Ok(rules);
        }
        rules.push(self.parse_rule(kind)?);
        while !self.at_end() {
            self.expect_char(',')?;
            rules.push(self.parse_rule(kind)?);
        }
        Ok(rules)
    }
}

/// Parse a condition set. A bare condition becomes an AND set of one.
pub fn parse(input: &str) -> Result<ConditionSet, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse_set()
}

/// Parse a comma-separated weighted rule list. Empty input yields no rules.
pub fn parse_rules(input: &str, kind: RuleKind) -> Result<Vec<ScoringRule>, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse_rules(kind)
}
