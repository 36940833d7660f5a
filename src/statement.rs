//! Parsed statements: a recursive-descent parser over the token queue plus
//! positional parameter binding.
//!
//! Parsing is a single linear pass with no backtracking; each production
//! consumes exactly the tokens it needs. `?` markers consume the parameter
//! list supplied at parse time in order, and any marker left over once the
//! list is exhausted stays [`Term::Pending`] until [`Statement::fill_params`]
//! realizes it.

use crate::error::{Error, Result};
use crate::table::ColumnType;
use crate::token::{Token, TokenKind, TokenQueue};
use crate::tokenizer::tokenize;
use crate::value::{ArithOp, Arithmetic, CmpOp, Comparator, Term, Value};

/// The operation a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateKeyspace,
    CreateTable,
    Insert,
    Update,
    Select,
    Delete,
    Truncate,
    DropTable,
    DropKeyspace,
}

/// Sort direction for an `ORDER BY` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// The left-hand side of a filter condition: a single column or a
/// parenthesized column tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Name(String),
    Tuple(Vec<String>),
}

/// A restriction attached to one filter key.
#[derive(Debug, Clone, PartialEq)]
pub enum Restriction {
    /// `col = value`
    Eq(Term),
    /// `col IN (v1, v2, ...)` — membership across the listed values.
    In(Vec<Term>),
    /// One or more range comparators, all of which must hold. Two
    /// inequality conditions on the same column merge into this list.
    Cmp(Vec<Comparator>),
}

/// The WHERE clause of a statement, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    entries: Vec<(ColumnRef, Restriction)>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ColumnRef, Restriction)> {
        self.entries.iter()
    }

    /// The restriction for a single named column, if present.
    pub fn get(&self, name: &str) -> Option<&Restriction> {
        self.entries.iter().find_map(|(key, r)| match key {
            ColumnRef::Name(n) if n == name => Some(r),
            _ => None,
        })
    }

    /// Attach a restriction, merging comparator lists when the same key is
    /// restricted twice (`ck1 >= 5 AND ck1 <= 7`).
    pub fn push(&mut self, key: ColumnRef, restriction: Restriction) {
        if let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            if let (Restriction::Cmp(have), Restriction::Cmp(new)) = (&mut *existing, &restriction)
            {
                have.extend(new.iter().cloned());
                return;
            }
            *existing = restriction;
            return;
        }
        self.entries.push((key, restriction));
    }

    fn terms_mut(&mut self) -> Vec<&mut Term> {
        let mut out = Vec::new();
        for (_, restriction) in self.entries.iter_mut() {
            match restriction {
                Restriction::Eq(term) => out.push(term),
                Restriction::In(terms) => out.extend(terms.iter_mut()),
                Restriction::Cmp(comparators) => {
                    for c in comparators.iter_mut() {
                        out.extend(c.values.iter_mut());
                    }
                }
            }
        }
        out
    }
}

/// The value side of an UPDATE assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `col = value` — direct overwrite.
    Set(Term),
    /// `col = col +/- amount` — deferred counter update.
    Counter(Arithmetic),
}

/// Structured arguments for a parsed statement, tagged by action so each
/// variant carries only the fields that action produces.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementArgs {
    CreateKeyspace {
        keyspace: String,
        check_exists: bool,
    },
    CreateTable {
        keyspace: Option<String>,
        table: String,
        check_exists: bool,
        columns: Vec<(String, ColumnType)>,
        partition_key: Vec<String>,
        clustering_key: Vec<String>,
    },
    Insert {
        keyspace: Option<String>,
        table: String,
        values: Vec<(String, Term)>,
        check_exists: bool,
    },
    Update {
        keyspace: Option<String>,
        table: String,
        assignments: Vec<(String, Assignment)>,
        filter: Filter,
    },
    Select {
        keyspace: Option<String>,
        table: String,
        columns: Vec<String>,
        filter: Filter,
        order: Vec<(String, SortOrder)>,
        limit: Option<usize>,
    },
    Delete {
        keyspace: Option<String>,
        table: String,
        filter: Filter,
    },
    Truncate {
        keyspace: Option<String>,
        table: String,
    },
    DropTable {
        keyspace: Option<String>,
        table: String,
    },
    DropKeyspace {
        keyspace: String,
    },
}

impl StatementArgs {
    /// Every parameter slot in declaration (source) order.
    fn terms_mut(&mut self) -> Vec<&mut Term> {
        match self {
            StatementArgs::Insert { values, .. } => {
                values.iter_mut().map(|(_, term)| term).collect()
            }
            StatementArgs::Update {
                assignments,
                filter,
                ..
            } => {
                let mut out: Vec<&mut Term> = Vec::new();
                for (_, assign) in assignments.iter_mut() {
                    match assign {
                        Assignment::Set(term) => out.push(term),
                        Assignment::Counter(arith) => out.push(&mut arith.amount),
                    }
                }
                out.extend(filter.terms_mut());
                out
            }
            StatementArgs::Select { filter, .. } | StatementArgs::Delete { filter, .. } => {
                filter.terms_mut()
            }
            _ => Vec::new(),
        }
    }
}

/// A parsed statement: the original CQL plus its structured arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub cql: String,
    pub args: StatementArgs,
}

impl Statement {
    /// Tokenize and parse `cql`, binding `?` markers from `params` in order.
    /// Markers beyond the supplied list are left pending.
    pub fn new(cql: &str, params: &[Value]) -> Result<Self> {
        let mut parser = Parser {
            tokens: tokenize(cql),
            params: params.iter(),
        };
        let args = parser.parse()?;
        Ok(Self {
            cql: cql.to_string(),
            args,
        })
    }

    pub fn action(&self) -> Action {
        match self.args {
            StatementArgs::CreateKeyspace { .. } => Action::CreateKeyspace,
            StatementArgs::CreateTable { .. } => Action::CreateTable,
            StatementArgs::Insert { .. } => Action::Insert,
            StatementArgs::Update { .. } => Action::Update,
            StatementArgs::Select { .. } => Action::Select,
            StatementArgs::Delete { .. } => Action::Delete,
            StatementArgs::Truncate { .. } => Action::Truncate,
            StatementArgs::DropTable { .. } => Action::DropTable,
            StatementArgs::DropKeyspace { .. } => Action::DropKeyspace,
        }
    }

    /// Produce a new statement with pending parameters replaced in
    /// declaration order. Values that are already realized are left
    /// untouched even when more parameters are supplied; running out of
    /// parameters while a pending slot remains is an error.
    pub fn fill_params(&self, params: &[Value]) -> Result<Statement> {
        let mut filled = self.clone();
        let mut supply = params.iter();
        for term in filled.args.terms_mut() {
            if term.is_pending() {
                match supply.next() {
                    Some(v) => *term = Term::Bound(v.clone()),
                    None => {
                        return Err(Error::invalid(
                            "Not enough params provided to fill_params",
                        ))
                    }
                }
            }
        }
        Ok(filled)
    }

    /// Driver-style alias for [`Statement::fill_params`].
    pub fn bind(&self, params: &[Value]) -> Result<Statement> {
        self.fill_params(params)
    }
}

/// An ordered collection of statements executed together by a session.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    statements: Vec<(Statement, Vec<Value>)>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, statement: Statement, params: Vec<Value>) {
        self.statements.push((statement, params));
    }

    pub fn statements(&self) -> &[(Statement, Vec<Value>)] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }
}

/// Token kinds usable as a bare name (identifiers plus unreserved keyword
/// text, so a table may be called `table` or `key`).
fn is_name_kind(kind: TokenKind) -> bool {
    !matches!(
        kind,
        TokenKind::Lparen
            | TokenKind::Rparen
            | TokenKind::Ltri
            | TokenKind::Rtri
            | TokenKind::Comma
            | TokenKind::Dot
            | TokenKind::Lbracket
            | TokenKind::Rbracket
            | TokenKind::Eql
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Parameter
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Eof
    )
}

struct Parser<'a> {
    tokens: TokenQueue,
    params: std::slice::Iter<'a, Value>,
}

impl Parser<'_> {
    fn parse(&mut self) -> Result<StatementArgs> {
        let first = self.tokens.pop();
        match first.kind {
            TokenKind::Create => match self.tokens.peek() {
                TokenKind::Table => {
                    self.tokens.pop();
                    self.parse_create_table()
                }
                _ => {
                    self.expect(TokenKind::Keyspace)?;
                    self.parse_create_keyspace()
                }
            },
            TokenKind::Drop => {
                let target = self.tokens.pop();
                match target.kind {
                    TokenKind::Table => {
                        let (keyspace, table) = self.parse_table_ref()?;
                        Ok(StatementArgs::DropTable { keyspace, table })
                    }
                    TokenKind::Keyspace => Ok(StatementArgs::DropKeyspace {
                        keyspace: self.parse_name()?,
                    }),
                    _ => Err(unexpected(&target)),
                }
            }
            TokenKind::Truncate => {
                let (keyspace, table) = self.parse_table_ref()?;
                Ok(StatementArgs::Truncate { keyspace, table })
            }
            TokenKind::Insert => self.parse_insert(),
            TokenKind::Update => self.parse_update(),
            TokenKind::Select => self.parse_select(),
            TokenKind::Delete => self.parse_delete(),
            _ => Err(unexpected(&first)),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        let token = self.tokens.pop();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(unexpected(&token))
        }
    }

    fn parse_name(&mut self) -> Result<String> {
        let token = self.tokens.pop();
        if is_name_kind(token.kind) {
            Ok(token.text)
        } else {
            Err(unexpected(&token))
        }
    }

    /// `[keyspace.]name`
    fn parse_table_ref(&mut self) -> Result<(Option<String>, String)> {
        let first = self.parse_name()?;
        if self.tokens.peek() == TokenKind::Dot {
            self.tokens.pop();
            let table = self.parse_name()?;
            Ok((Some(first), table))
        } else {
            Ok((None, first))
        }
    }

    /// Consume a leading `IF NOT EXISTS` if present.
    fn parse_if_not_exists(&mut self) -> Result<bool> {
        if self.tokens.peek() != TokenKind::If {
            return Ok(false);
        }
        self.tokens.pop();
        self.expect(TokenKind::Not)?;
        self.expect(TokenKind::Exists)?;
        Ok(true)
    }

    /// A literal value or `?` marker in a value position. Bare identifiers
    /// are treated as text, and a bare `NULL` as an explicit null.
    fn parse_term(&mut self) -> Result<Term> {
        let token = self.tokens.pop();
        match token.kind {
            TokenKind::Parameter => Ok(self
                .params
                .next()
                .map(|v| Term::Bound(v.clone()))
                .unwrap_or(Term::Pending)),
            TokenKind::Int | TokenKind::Float | TokenKind::String => {
                Ok(Term::Bound(token.normalized_value()))
            }
            kind if is_name_kind(kind) => {
                if token.text.eq_ignore_ascii_case("null") {
                    Ok(Term::Bound(Value::Null))
                } else {
                    Ok(Term::Bound(Value::Text(token.text)))
                }
            }
            _ => Err(unexpected(&token)),
        }
    }

    fn parse_create_keyspace(&mut self) -> Result<StatementArgs> {
        let check_exists = self.parse_if_not_exists()?;
        let keyspace = self.parse_name()?;
        // drain the replication options; they carry no meaning here
        while self.tokens.pop().kind != TokenKind::Eof {}
        Ok(StatementArgs::CreateKeyspace {
            keyspace,
            check_exists,
        })
    }

    fn parse_create_table(&mut self) -> Result<StatementArgs> {
        let check_exists = self.parse_if_not_exists()?;
        let (keyspace, table) = self.parse_table_ref()?;
        self.expect(TokenKind::Lparen)?;

        let mut columns: Vec<(String, ColumnType)> = Vec::new();
        let mut inline_pk: Option<String> = None;
        let mut explicit_pk: Option<(Vec<String>, Vec<String>)> = None;

        loop {
            if self.tokens.peek() == TokenKind::Primary {
                self.tokens.pop();
                self.expect(TokenKind::Key)?;
                self.expect(TokenKind::Lparen)?;
                explicit_pk = Some(self.parse_primary_key_group()?);
            } else {
                let name = self.parse_name()?;
                let type_name = self.parse_name()?;
                let kind = ColumnType::parse(&type_name)?;
                columns.push((name.clone(), kind));
                if self.tokens.peek() == TokenKind::Primary {
                    self.tokens.pop();
                    self.expect(TokenKind::Key)?;
                    inline_pk = Some(name);
                }
            }
            let sep = self.tokens.pop();
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::Rparen => break,
                _ => return Err(unexpected(&sep)),
            }
        }

        // a trailing PRIMARY KEY (...) clause overrides an inline one
        let (partition_key, clustering_key) = match (explicit_pk, inline_pk) {
            (Some(pk), _) => pk,
            (None, Some(col)) => (vec![col], Vec::new()),
            (None, None) => {
                return Err(Error::invalid(format!(
                    "No PRIMARY KEY specified for table \"{table}\""
                )))
            }
        };

        Ok(StatementArgs::CreateTable {
            keyspace,
            table,
            check_exists,
            columns,
            partition_key,
            clustering_key,
        })
    }

    /// The interior of `PRIMARY KEY ( ... )`. A parenthesized first element
    /// is a composite partition key; every following name is clustering.
    fn parse_primary_key_group(&mut self) -> Result<(Vec<String>, Vec<String>)> {
        let mut partition = Vec::new();
        let mut clustering = Vec::new();
        if self.tokens.peek() == TokenKind::Lparen {
            self.tokens.pop();
            loop {
                partition.push(self.parse_name()?);
                let sep = self.tokens.pop();
                match sep.kind {
                    TokenKind::Comma => continue,
                    TokenKind::Rparen => break,
                    _ => return Err(unexpected(&sep)),
                }
            }
        } else {
            partition.push(self.parse_name()?);
        }
        loop {
            let sep = self.tokens.pop();
            match sep.kind {
                TokenKind::Comma => clustering.push(self.parse_name()?),
                TokenKind::Rparen => break,
                _ => return Err(unexpected(&sep)),
            }
        }
        Ok((partition, clustering))
    }

    fn parse_insert(&mut self) -> Result<StatementArgs> {
        // INTO is not in the keyword table; it scans as a bare identifier
        let into = self.tokens.pop();
        if !into.text.eq_ignore_ascii_case("into") {
            return Err(unexpected(&into));
        }
        let (keyspace, table) = self.parse_table_ref()?;

        self.expect(TokenKind::Lparen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_name()?);
            let sep = self.tokens.pop();
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::Rparen => break,
                _ => return Err(unexpected(&sep)),
            }
        }

        self.expect(TokenKind::Values)?;
        self.expect(TokenKind::Lparen)?;
        let mut terms = Vec::new();
        loop {
            terms.push(self.parse_term()?);
            let sep = self.tokens.pop();
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::Rparen => break,
                _ => return Err(unexpected(&sep)),
            }
        }

        if columns.len() != terms.len() {
            return Err(Error::invalid(format!(
                "Expected {} values for {} columns",
                terms.len(),
                columns.len()
            )));
        }
        let check_exists = self.parse_if_not_exists()?;

        Ok(StatementArgs::Insert {
            keyspace,
            table,
            values: columns.into_iter().zip(terms).collect(),
            check_exists,
        })
    }

    fn parse_update(&mut self) -> Result<StatementArgs> {
        let (keyspace, table) = self.parse_table_ref()?;
        self.expect(TokenKind::Set)?;

        let mut assignments = Vec::new();
        let filter;
        loop {
            let column = self.parse_name()?;
            self.expect(TokenKind::Eql)?;
            let assignment = if self.assignment_is_arithmetic(&column) {
                self.tokens.pop(); // the repeated column name
                let op = match self.tokens.pop().kind {
                    TokenKind::Plus => ArithOp::Plus,
                    _ => ArithOp::Minus,
                };
                let amount = self.parse_term()?;
                Assignment::Counter(Arithmetic::new(op, column.clone(), amount))
            } else {
                Assignment::Set(self.parse_term()?)
            };
            assignments.push((column, assignment));

            let sep = self.tokens.pop();
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::Where => {
                    filter = self.parse_filter()?;
                    break;
                }
                TokenKind::Eof => {
                    filter = Filter::default();
                    break;
                }
                _ => return Err(unexpected(&sep)),
            }
        }

        Ok(StatementArgs::Update {
            keyspace,
            table,
            assignments,
            filter,
        })
    }

    /// True when the assignment value repeats the assigned column followed
    /// by `+` or `-` (`other_field = other_field + 1`).
    fn assignment_is_arithmetic(&self, column: &str) -> bool {
        match self.tokens.front() {
            Some(token) if is_name_kind(token.kind) && token.text == column => matches!(
                self.tokens.peek_nth(1),
                TokenKind::Plus | TokenKind::Minus
            ),
            _ => false,
        }
    }

    fn parse_select(&mut self) -> Result<StatementArgs> {
        let mut columns = Vec::new();
        loop {
            let token = self.tokens.pop();
            match token.kind {
                TokenKind::From => break,
                TokenKind::Comma => continue,
                TokenKind::Star => columns.push("*".to_string()),
                kind if is_name_kind(kind) => columns.push(token.text),
                _ => return Err(unexpected(&token)),
            }
        }
        let (keyspace, table) = self.parse_table_ref()?;

        let filter = if self.tokens.peek() == TokenKind::Where {
            self.tokens.pop();
            self.parse_filter()?
        } else {
            Filter::default()
        };

        let mut order = Vec::new();
        if self.tokens.peek() == TokenKind::Order {
            self.tokens.pop();
            self.expect(TokenKind::By)?;
            loop {
                let column = self.parse_name()?;
                let direction = match self.tokens.peek() {
                    TokenKind::Asc => {
                        self.tokens.pop();
                        SortOrder::Asc
                    }
                    TokenKind::Desc => {
                        self.tokens.pop();
                        SortOrder::Desc
                    }
                    _ => SortOrder::Asc,
                };
                order.push((column, direction));
                if self.tokens.peek() == TokenKind::Comma {
                    self.tokens.pop();
                    continue;
                }
                break;
            }
        }

        let limit = if self.tokens.peek() == TokenKind::Limit {
            self.tokens.pop();
            let token = self.expect(TokenKind::Int)?;
            let n = token
                .text
                .parse::<usize>()
                .map_err(|_| unexpected(&token))?;
            Some(n)
        } else {
            None
        };

        Ok(StatementArgs::Select {
            keyspace,
            table,
            columns,
            filter,
            order,
            limit,
        })
    }

    fn parse_delete(&mut self) -> Result<StatementArgs> {
        self.expect(TokenKind::From)?;
        let (keyspace, table) = self.parse_table_ref()?;
        let filter = if self.tokens.peek() == TokenKind::Where {
            self.tokens.pop();
            self.parse_filter()?
        } else {
            Filter::default()
        };
        Ok(StatementArgs::Delete {
            keyspace,
            table,
            filter,
        })
    }

    /// `cond [AND cond]*`, stopping before ORDER/LIMIT.
    fn parse_filter(&mut self) -> Result<Filter> {
        let mut filter = Filter::default();
        loop {
            self.parse_condition(&mut filter)?;
            if self.tokens.peek() == TokenKind::And {
                self.tokens.pop();
                continue;
            }
            break;
        }
        Ok(filter)
    }

    fn parse_condition(&mut self, filter: &mut Filter) -> Result<()> {
        if self.tokens.peek() == TokenKind::Lparen {
            return self.parse_tuple_condition(filter);
        }

        let column = self.parse_name()?;
        let op_token = self.tokens.pop();
        match op_token.kind {
            TokenKind::Eql => {
                let term = self.parse_term()?;
                filter.push(ColumnRef::Name(column), Restriction::Eq(term));
            }
            TokenKind::In => {
                self.expect(TokenKind::Lparen)?;
                let mut terms = Vec::new();
                loop {
                    terms.push(self.parse_term()?);
                    let sep = self.tokens.pop();
                    match sep.kind {
                        TokenKind::Comma => continue,
                        TokenKind::Rparen => break,
                        _ => return Err(unexpected(&sep)),
                    }
                }
                filter.push(ColumnRef::Name(column), Restriction::In(terms));
            }
            TokenKind::Ltri | TokenKind::Rtri => {
                let op = self.comparison_op(op_token.kind);
                let term = self.parse_term()?;
                let comparator = Comparator::single(op, column.clone(), term);
                filter.push(ColumnRef::Name(column), Restriction::Cmp(vec![comparator]));
            }
            _ => return Err(unexpected(&op_token)),
        }
        Ok(())
    }

    /// `(ck1, ck2) OP (v1, v2)` — a single comparator over a column tuple.
    fn parse_tuple_condition(&mut self, filter: &mut Filter) -> Result<()> {
        self.expect(TokenKind::Lparen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_name()?);
            let sep = self.tokens.pop();
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::Rparen => break,
                _ => return Err(unexpected(&sep)),
            }
        }

        let op_token = self.tokens.pop();
        let op = match op_token.kind {
            TokenKind::Eql => CmpOp::Eq,
            TokenKind::Ltri | TokenKind::Rtri => self.comparison_op(op_token.kind),
            _ => return Err(unexpected(&op_token)),
        };

        self.expect(TokenKind::Lparen)?;
        let mut terms = Vec::new();
        loop {
            terms.push(self.parse_term()?);
            let sep = self.tokens.pop();
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::Rparen => break,
                _ => return Err(unexpected(&sep)),
            }
        }

        let comparator = Comparator::new(op, columns.clone(), terms);
        filter.push(ColumnRef::Tuple(columns), Restriction::Cmp(vec![comparator]));
        Ok(())
    }

    /// Resolve `<`/`>` plus an optional trailing `=` into the operator;
    /// `<=` and `>=` are two-token lexemes.
    fn comparison_op(&mut self, kind: TokenKind) -> CmpOp {
        let with_equal = self.tokens.peek() == TokenKind::Eql;
        if with_equal {
            self.tokens.pop();
        }
        match (kind, with_equal) {
            (TokenKind::Ltri, false) => CmpOp::Lt,
            (TokenKind::Ltri, true) => CmpOp::Le,
            (TokenKind::Rtri, false) => CmpOp::Gt,
            _ => CmpOp::Ge,
        }
    }
}

fn unexpected(token: &Token) -> Error {
    if token.kind == TokenKind::Eof {
        Error::invalid("Unexpected end of statement")
    } else {
        Error::invalid(format!("Unexpected token \"{}\" in statement", token.text))
    }
}
