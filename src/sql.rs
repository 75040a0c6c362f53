//! Structured query representation rendered to DuckDB SQL.
//!
//! Chart queries are assembled from [`Expr`], [`Select`] and [`Query`] values
//! and only turned into text by their `Display` implementations. Identifiers
//! are always double-quoted and string literals single-quoted, with embedded
//! quotes doubled, so user column names never need manual escaping.

use std::fmt;

// =============================================================================
// Quoting
// =============================================================================

/// Quote an identifier (column, table or alias name)
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Expressions
// =============================================================================

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

/// Target types of casts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Double,
    Varchar,
    Date,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Double => "DOUBLE",
            SqlType::Varchar => "VARCHAR",
            SqlType::Date => "DATE",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Gt,
    And,
}

impl BinaryOp {
    fn as_sql(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Gt => ">",
            BinaryOp::And => "AND",
        }
    }
}

/// A scalar or aggregate SQL expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Unqualified column reference
    Column(String),
    /// Column reference qualified by a table alias
    QualifiedColumn { table: String, name: String },
    Literal(Literal),
    /// Function call, e.g. `round(sum(x), 2)` or `count(DISTINCT x)`
    Function {
        name: &'static str,
        args: Vec<Expr>,
        distinct: bool,
    },
    Cast { expr: Box<Expr>, to: SqlType },
    /// Cast yielding NULL instead of failing
    TryCast { expr: Box<Expr>, to: SqlType },
    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    IsNull { expr: Box<Expr>, negated: bool },
    InList { expr: Box<Expr>, list: Vec<Expr> },
    Exists { query: Box<Query>, negated: bool },
    /// `*`
    Star,
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::QualifiedColumn {
            table: table.into(),
            name: name.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Expr::Literal(Literal::Float(value))
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Literal(Literal::Boolean(value))
    }

    pub fn function(name: &'static str, args: Vec<Expr>) -> Self {
        Expr::Function {
            name,
            args,
            distinct: false,
        }
    }

    /// `count(DISTINCT expr)`
    pub fn count_distinct(expr: Expr) -> Self {
        Expr::Function {
            name: "count",
            args: vec![expr],
            distinct: true,
        }
    }

    /// `count(*)`
    pub fn count_star() -> Self {
        Expr::function("count", vec![Expr::Star])
    }

    pub fn cast(self, to: SqlType) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            to,
        }
    }

    pub fn try_cast(self, to: SqlType) -> Self {
        Expr::TryCast {
            expr: Box::new(self),
            to,
        }
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn eq(self, other: Expr) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn gt(self, other: Expr) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn and(self, other: Expr) -> Self {
        self.binary(BinaryOp::And, other)
    }

    pub fn in_list(self, list: Vec<Expr>) -> Self {
        Expr::InList {
            expr: Box::new(self),
            list,
        }
    }

    pub fn not_exists(query: Query) -> Self {
        Expr::Exists {
            query: Box::new(query),
            negated: true,
        }
    }

    /// Conjunction of all predicates, `None` when there are none
    pub fn all(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        predicates.into_iter().reduce(|acc, p| acc.and(p))
    }

    fn binary(self, op: BinaryOp, other: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Whether this expression contains an aggregate function call
    pub fn is_aggregate(&self) -> bool {
        match self {
            Expr::Function { name, args, .. } => {
                matches!(*name, "count" | "sum" | "avg" | "min" | "max" | "bool_or")
                    || args.iter().any(Expr::is_aggregate)
            }
            Expr::Cast { expr, .. } | Expr::TryCast { expr, .. } => expr.is_aggregate(),
            Expr::Case {
                operand,
                branches,
                otherwise,
            } => {
                operand.as_ref().is_some_and(|o| o.is_aggregate())
                    || branches
                        .iter()
                        .any(|(w, t)| w.is_aggregate() || t.is_aggregate())
                    || otherwise.as_ref().is_some_and(|o| o.is_aggregate())
            }
            Expr::Binary { left, right, .. } => left.is_aggregate() || right.is_aggregate(),
            Expr::IsNull { expr, .. } => expr.is_aggregate(),
            Expr::InList { expr, list } => {
                expr.is_aggregate() || list.iter().any(Expr::is_aggregate)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{}", quote_literal(s)),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::Boolean(true) => write!(f, "TRUE"),
            Literal::Boolean(false) => write!(f, "FALSE"),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

/// Render an operand, parenthesized when it is a binary expression of another operator
fn write_operand(f: &mut fmt::Formatter<'_>, parent: BinaryOp, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Binary { op, .. } if *op != parent || parent != BinaryOp::And => {
            write!(f, "({})", expr)
        }
        _ => write!(f, "{}", expr),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", quote_ident(name)),
            Expr::QualifiedColumn { table, name } => {
                write!(f, "{}.{}", quote_ident(table), quote_ident(name))
            }
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Function {
                name,
                args,
                distinct,
            } => {
                let args = args
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                if *distinct {
                    write!(f, "{}(DISTINCT {})", name, args)
                } else {
                    write!(f, "{}({})", name, args)
                }
            }
            Expr::Cast { expr, to } => write!(f, "CAST({} AS {})", expr, to.as_sql()),
            Expr::TryCast { expr, to } => write!(f, "TRY_CAST({} AS {})", expr, to.as_sql()),
            Expr::Case {
                operand,
                branches,
                otherwise,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(otherwise) = otherwise {
                    write!(f, " ELSE {}", otherwise)?;
                }
                write!(f, " END")
            }
            Expr::Binary { op, left, right } => {
                write_operand(f, *op, left)?;
                write!(f, " {} ", op.as_sql())?;
                write_operand(f, *op, right)
            }
            Expr::IsNull { expr, negated } => {
                if matches!(**expr, Expr::Binary { .. }) {
                    write!(f, "({})", expr)?;
                } else {
                    write!(f, "{}", expr)?;
                }
                if *negated {
                    write!(f, " IS NOT NULL")
                } else {
                    write!(f, " IS NULL")
                }
            }
            Expr::InList { expr, list } => {
                let list = list
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{} IN ({})", expr, list)
            }
            Expr::Exists { query, negated } => {
                if *negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "EXISTS (\n{}\n)", indent(&query.to_string()))
            }
            Expr::Star => write!(f, "*"),
        }
    }
}

// =============================================================================
// Select
// =============================================================================

/// One entry of a select list
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

/// One ORDER BY key; nulls always sort last
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub descending: bool,
}

impl OrderItem {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            descending: false,
        }
    }
}

/// Grouping clause of a select
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GroupBy {
    /// Row-level granularity
    #[default]
    None,
    /// `GROUP BY ALL`: every non-aggregated select item is a group key
    All,
    /// `GROUP BY GROUPING SETS ((a, b), (b, c), ...)`
    GroupingSets(Vec<Vec<Expr>>),
}

/// A relation in a FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table { name: String, alias: Option<String> },
    Subquery { query: Box<Query>, alias: String },
}

impl TableRef {
    pub fn table(name: impl Into<String>) -> Self {
        TableRef::Table {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        TableRef::Table {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }
}

/// A single SELECT statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    /// Relations, cross joined when more than one
    pub from: Vec<TableRef>,
    pub filter: Option<Expr>,
    pub group_by: GroupBy,
    pub order_by: Vec<OrderItem>,
}

impl Select {
    pub fn from_table(name: impl Into<String>) -> Self {
        Self {
            from: vec![TableRef::table(name)],
            ..Default::default()
        }
    }

    pub fn from_ref(table: TableRef) -> Self {
        Self {
            from: vec![table],
            ..Default::default()
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn select(mut self, expr: Expr) -> Self {
        self.items.push(SelectItem { expr, alias: None });
        self
    }

    pub fn select_as(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.items.push(SelectItem {
            expr,
            alias: Some(alias.into()),
        });
        self
    }

    pub fn join(mut self, table: TableRef) -> Self {
        self.from.push(table);
        self
    }

    /// Add a predicate, AND-ed with any existing filter
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = match self.filter.take() {
            Some(existing) => Some(existing.and(predicate)),
            None => Some(predicate),
        };
        self
    }

    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn into_query(self) -> Query {
        Query::Select(Box::new(self))
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.distinct {
            writeln!(f, "SELECT DISTINCT")?;
        } else {
            writeln!(f, "SELECT")?;
        }
        let items = self
            .items
            .iter()
            .map(|item| match &item.alias {
                Some(alias) => format!("    {} AS {}", item.expr, quote_ident(alias)),
                None => format!("    {}", item.expr),
            })
            .collect::<Vec<_>>()
            .join(",\n");
        write!(f, "{}", items)?;

        if !self.from.is_empty() {
            let from = self
                .from
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "\nFROM {}", from)?;
        }
        if let Some(filter) = &self.filter {
            write!(f, "\nWHERE {}", filter)?;
        }
        match &self.group_by {
            GroupBy::None => {}
            GroupBy::All => write!(f, "\nGROUP BY ALL")?,
            GroupBy::GroupingSets(sets) => {
                let sets = sets
                    .iter()
                    .map(|set| {
                        let cols = set
                            .iter()
                            .map(|e| e.to_string())
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("({})", cols)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "\nGROUP BY GROUPING SETS ({})", sets)?;
            }
        }
        if !self.order_by.is_empty() {
            let keys = self
                .order_by
                .iter()
                .map(|o| {
                    let direction = if o.descending { "DESC" } else { "ASC" };
                    format!("{} {} NULLS LAST", o.expr, direction)
                })
                .collect::<Vec<_>>()
                .join(",\n    ");
            write!(f, "\nORDER BY\n    {}", keys)?;
        }
        Ok(())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRef::Table { name, alias: None } => write!(f, "{}", quote_ident(name)),
            TableRef::Table {
                name,
                alias: Some(alias),
            } => write!(f, "{} AS {}", quote_ident(name), quote_ident(alias)),
            TableRef::Subquery { query, alias } => write!(
                f,
                "(\n{}\n) AS {}",
                indent(&query.to_string()),
                quote_ident(alias)
            ),
        }
    }
}

// =============================================================================
// Query
// =============================================================================

/// A named common table expression
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: Query,
}

/// A complete query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(Box<Select>),
    UnionAll(Vec<Query>),
    With { ctes: Vec<Cte>, body: Box<Query> },
}

impl Query {
    pub fn union_all(parts: Vec<Query>) -> Self {
        Query::UnionAll(parts)
    }

    pub fn with(ctes: Vec<Cte>, body: Query) -> Self {
        Query::With {
            ctes,
            body: Box::new(body),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Select(select) => write!(f, "{}", select),
            Query::UnionAll(parts) => {
                let parts = parts
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join("\nUNION ALL\n");
                write!(f, "{}", parts)
            }
            Query::With { ctes, body } => {
                let ctes = ctes
                    .iter()
                    .map(|cte| {
                        format!(
                            "{} AS (\n{}\n)",
                            quote_ident(&cte.name),
                            indent(&cte.query.to_string())
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(",\n");
                write!(f, "WITH {}\n{}", ctes, body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("Price Now"), "\"Price Now\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_function_and_casts() {
        let expr = Expr::function(
            "round",
            vec![
                Expr::function(
                    "sum",
                    vec![Expr::column("x").cast(SqlType::Varchar).try_cast(SqlType::Double)],
                ),
                Expr::int(2),
            ],
        );
        assert_eq!(
            expr.to_string(),
            "round(sum(TRY_CAST(CAST(\"x\" AS VARCHAR) AS DOUBLE)), 2)"
        );
        assert!(expr.is_aggregate());
    }

    #[test]
    fn test_count_distinct() {
        assert_eq!(
            Expr::count_distinct(Expr::column("c")).to_string(),
            "count(DISTINCT \"c\")"
        );
        assert_eq!(Expr::count_star().to_string(), "count(*)");
    }

    #[test]
    fn test_case_expression() {
        let expr = Expr::Case {
            operand: Some(Box::new(Expr::column("d"))),
            branches: vec![(Expr::string("Monday"), Expr::int(100))],
            otherwise: None,
        };
        assert_eq!(expr.to_string(), "CASE \"d\" WHEN 'Monday' THEN 100 END");
        assert!(!expr.is_aggregate());
    }

    #[test]
    fn test_conjunction() {
        let predicate = Expr::all(vec![
            Expr::column("a").is_not_null(),
            Expr::column("b").is_not_null(),
            Expr::column("v").gt(Expr::int(0)),
        ])
        .unwrap();
        assert_eq!(
            predicate.to_string(),
            "\"a\" IS NOT NULL AND \"b\" IS NOT NULL AND (\"v\" > 0)"
        );
        assert!(Expr::all(Vec::new()).is_none());
    }

    #[test]
    fn test_float_literal_keeps_decimal_point() {
        assert_eq!(Expr::float(0.0).to_string(), "0.0");
        assert_eq!(Expr::float(0.5).to_string(), "0.5");
    }

    #[test]
    fn test_select_rendering() {
        let query = Select::from_table("sales")
            .select_as(Expr::function("count", vec![Expr::column("id")]), "id")
            .select(Expr::column("region"))
            .filter(Expr::column("id").is_not_null())
            .group_by(GroupBy::All)
            .order_by(OrderItem::asc(Expr::column("region")))
            .into_query();

        let expected = "SELECT\n    count(\"id\") AS \"id\",\n    \"region\"\nFROM \"sales\"\nWHERE \"id\" IS NOT NULL\nGROUP BY ALL\nORDER BY\n    \"region\" ASC NULLS LAST";
        assert_eq!(query.to_string(), expected);
    }

    #[test]
    fn test_grouping_sets_rendering() {
        let select = Select::from_table("t")
            .select(Expr::column("a"))
            .group_by(GroupBy::GroupingSets(vec![
                vec![Expr::column("a"), Expr::column("b")],
                vec![Expr::column("b"), Expr::column("c")],
            ]));
        assert!(select
            .to_string()
            .ends_with("GROUP BY GROUPING SETS ((\"a\", \"b\"), (\"b\", \"c\"))"));
    }

    #[test]
    fn test_with_and_union() {
        let part = |v: i64| Select::default().select_as(Expr::int(v), "v").into_query();
        let query = Query::with(
            vec![Cte {
                name: "base".to_string(),
                query: part(1),
            }],
            Query::union_all(vec![part(2), part(3)]),
        );
        let sql = query.to_string();
        assert!(sql.starts_with("WITH \"base\" AS (\n    SELECT\n        1 AS \"v\"\n)"));
        assert!(sql.contains("\nUNION ALL\n"));
    }

    #[test]
    fn test_not_exists_and_subquery() {
        let inner = Select::from_ref(TableRef::aliased("existing", "e"))
            .select(Expr::int(1))
            .filter(Expr::qualified("e", "x").eq(Expr::qualified("xv", "x")))
            .into_query();
        let expr = Expr::not_exists(inner);
        let sql = expr.to_string();
        assert!(sql.starts_with("NOT EXISTS (\n    SELECT"));
        assert!(sql.contains("\"e\".\"x\" = \"xv\".\"x\""));
    }

    #[test]
    fn test_nested_binary_is_parenthesized() {
        let expr = Expr::column("a").eq(Expr::column("b")).and(Expr::column("c").is_null());
        assert_eq!(expr.to_string(), "(\"a\" = \"b\") AND \"c\" IS NULL");
    }
}
