//! Statements and queries.

use sqlparser::ast as sql_ast;
use tabula_common::Field;

use super::expr::{data_type_from_sql_ast, Expr};
use super::object_name;
use crate::error::{ScriptError, ScriptResult};

/// A script statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE name AS <query>`.
    CreateTableAs {
        /// Binding name.
        name: String,
        /// Defining query.
        query: Box<Query>,
        /// OR REPLACE.
        or_replace: bool,
        /// IF NOT EXISTS.
        if_not_exists: bool,
    },
    /// `CREATE TABLE name (col TYPE, ...)`.
    CreateTable {
        /// Binding name.
        name: String,
        /// Column definitions.
        fields: Vec<Field>,
        /// OR REPLACE.
        or_replace: bool,
        /// IF NOT EXISTS.
        if_not_exists: bool,
    },
    /// `INSERT INTO table [(cols)] <source>`.
    Insert {
        /// Target binding.
        table: String,
        /// Target columns, empty for all.
        columns: Vec<String>,
        /// Row source, a VALUES list or a query.
        source: Box<Query>,
    },
    /// `UPDATE table SET ... [WHERE ...]`.
    Update {
        /// Target binding.
        table: String,
        /// SET assignments.
        assignments: Vec<Assignment>,
        /// WHERE clause.
        selection: Option<Expr>,
    },
    /// `DELETE FROM table [WHERE ...]`.
    Delete {
        /// Target binding.
        table: String,
        /// WHERE clause.
        selection: Option<Expr>,
    },
    /// `DROP TABLE [IF EXISTS] names`.
    DropTable {
        /// Bindings to remove.
        names: Vec<String>,
        /// IF EXISTS.
        if_exists: bool,
    },
    /// A query, optionally with `SELECT ... INTO name`.
    Select {
        /// The query.
        query: Box<Query>,
        /// INTO target.
        into: Option<String>,
    },
}

impl Statement {
    /// Converts from sqlparser's Statement.
    pub fn from_sql_ast(stmt: sql_ast::Statement) -> ScriptResult<Self> {
        match stmt {
            sql_ast::Statement::Query(query) => {
                let into = select_into(&query);
                Ok(Statement::Select {
                    query: Box::new(Query::from_sql_ast(*query)?),
                    into,
                })
            }
            sql_ast::Statement::CreateTable {
                name,
                columns,
                query,
                or_replace,
                if_not_exists,
                ..
            } => {
                let name = object_name(&name);
                match query {
                    Some(query) => {
                        if !columns.is_empty() {
                            return Err(ScriptError::Unsupported(
                                "CREATE TABLE with both columns and AS".to_string(),
                            ));
                        }
                        Ok(Statement::CreateTableAs {
                            name,
                            query: Box::new(Query::from_sql_ast(*query)?),
                            or_replace,
                            if_not_exists,
                        })
                    }
                    None => {
                        let fields: ScriptResult<Vec<_>> = columns
                            .into_iter()
                            .map(|c| Ok(Field::new(c.name.value, data_type_from_sql_ast(&c.data_type)?)))
                            .collect();
                        Ok(Statement::CreateTable {
                            name,
                            fields: fields?,
                            or_replace,
                            if_not_exists,
                        })
                    }
                }
            }
            sql_ast::Statement::Insert {
                table_name,
                columns,
                source,
                ..
            } => {
                let source = source.ok_or_else(|| {
                    ScriptError::Unsupported("INSERT without a row source".to_string())
                })?;
                Ok(Statement::Insert {
                    table: object_name(&table_name),
                    columns: columns.into_iter().map(|c| c.value).collect(),
                    source: Box::new(Query::from_sql_ast(*source)?),
                })
            }
            sql_ast::Statement::Update {
                table,
                assignments,
                from,
                selection,
                ..
            } => {
                if from.is_some() {
                    return Err(ScriptError::Unsupported("UPDATE ... FROM".to_string()));
                }
                let table = plain_table_name(table.relation, "UPDATE")?;
                let assignments: ScriptResult<Vec<_>> = assignments
                    .into_iter()
                    .map(Assignment::from_sql_ast)
                    .collect();
                Ok(Statement::Update {
                    table,
                    assignments: assignments?,
                    selection: selection.map(Expr::from_sql_ast).transpose()?,
                })
            }
            sql_ast::Statement::Delete {
                from, selection, ..
            } => {
                let mut from = from.into_iter();
                let table = match (from.next(), from.next()) {
                    (Some(t), None) if t.joins.is_empty() => plain_table_name(t.relation, "DELETE")?,
                    _ => {
                        return Err(ScriptError::Unsupported(
                            "DELETE from more than one table".to_string(),
                        ))
                    }
                };
                Ok(Statement::Delete {
                    table,
                    selection: selection.map(Expr::from_sql_ast).transpose()?,
                })
            }
            sql_ast::Statement::Drop {
                object_type: sql_ast::ObjectType::Table,
                if_exists,
                names,
                ..
            } => Ok(Statement::DropTable {
                names: names.iter().map(object_name).collect(),
                if_exists,
            }),
            other => Err(ScriptError::Unsupported(format!("statement: {}", other))),
        }
    }

    /// Returns the statement keyword, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateTableAs { .. } | Statement::CreateTable { .. } => "CREATE TABLE",
            Statement::Insert { .. } => "INSERT",
            Statement::Update { .. } => "UPDATE",
            Statement::Delete { .. } => "DELETE",
            Statement::DropTable { .. } => "DROP TABLE",
            Statement::Select { .. } => "SELECT",
        }
    }
}

/// Extracts `SELECT ... INTO name` from the outermost select, if any.
fn select_into(query: &sql_ast::Query) -> Option<String> {
    match query.body.as_ref() {
        sql_ast::SetExpr::Select(select) => select.into.as_ref().map(|i| object_name(&i.name)),
        _ => None,
    }
}

fn plain_table_name(factor: sql_ast::TableFactor, statement: &str) -> ScriptResult<String> {
    match factor {
        sql_ast::TableFactor::Table { name, .. } => Ok(object_name(&name)),
        _ => Err(ScriptError::Unsupported(format!(
            "{} target must be a table",
            statement
        ))),
    }
}

/// An assignment (column = value).
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Column being assigned.
    pub column: String,
    /// Value being assigned.
    pub value: Expr,
}

impl Assignment {
    /// Converts from sqlparser's Assignment.
    pub fn from_sql_ast(assign: sql_ast::Assignment) -> ScriptResult<Self> {
        let column = assign
            .id
            .last()
            .map(|ident| ident.value.clone())
            .ok_or_else(|| ScriptError::Syntax("empty assignment target".to_string()))?;

        Ok(Self {
            column,
            value: Expr::from_sql_ast(assign.value)?,
        })
    }
}

/// A query: optional CTEs, a body, ordering and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// WITH clause.
    pub ctes: Vec<Cte>,
    /// The query body.
    pub body: SetExpr,
    /// ORDER BY clauses.
    pub order_by: Vec<OrderByExpr>,
    /// LIMIT expression.
    pub limit: Option<Expr>,
    /// OFFSET expression.
    pub offset: Option<Expr>,
}

impl Query {
    /// Converts from sqlparser's Query.
    pub fn from_sql_ast(query: sql_ast::Query) -> ScriptResult<Self> {
        let ctes: ScriptResult<Vec<_>> = query
            .with
            .map(|w| w.cte_tables.into_iter().map(Cte::from_sql_ast).collect())
            .unwrap_or_else(|| Ok(Vec::new()));

        let order_by: ScriptResult<Vec<_>> = query
            .order_by
            .into_iter()
            .map(OrderByExpr::from_sql_ast)
            .collect();

        Ok(Self {
            ctes: ctes?,
            body: SetExpr::from_sql_ast(*query.body)?,
            order_by: order_by?,
            limit: query.limit.map(Expr::from_sql_ast).transpose()?,
            offset: query
                .offset
                .map(|o| Expr::from_sql_ast(o.value))
                .transpose()?,
        })
    }
}

/// A common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    /// Name visible to the rest of the query.
    pub name: String,
    /// Defining query.
    pub query: Query,
}

impl Cte {
    /// Converts from sqlparser's Cte.
    pub fn from_sql_ast(cte: sql_ast::Cte) -> ScriptResult<Self> {
        if !cte.alias.columns.is_empty() {
            return Err(ScriptError::Unsupported(
                "column list on WITH alias".to_string(),
            ));
        }
        Ok(Self {
            name: cte.alias.name.value,
            query: Query::from_sql_ast(*cte.query)?,
        })
    }
}

/// The body of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    /// A SELECT block.
    Select(Box<Select>),
    /// A VALUES list.
    Values(Vec<Vec<Expr>>),
    /// UNION [ALL] of two bodies.
    Union {
        /// Left side.
        left: Box<SetExpr>,
        /// Right side.
        right: Box<SetExpr>,
        /// Keep duplicates.
        all: bool,
    },
    /// A parenthesized query.
    Query(Box<Query>),
}

impl SetExpr {
    /// Converts from sqlparser's SetExpr.
    pub fn from_sql_ast(body: sql_ast::SetExpr) -> ScriptResult<Self> {
        match body {
            sql_ast::SetExpr::Select(select) => {
                Ok(SetExpr::Select(Box::new(Select::from_sql_ast(*select)?)))
            }
            sql_ast::SetExpr::Values(values) => {
                let rows: ScriptResult<Vec<Vec<_>>> = values
                    .rows
                    .into_iter()
                    .map(|row| row.into_iter().map(Expr::from_sql_ast).collect())
                    .collect();
                Ok(SetExpr::Values(rows?))
            }
            sql_ast::SetExpr::SetOperation {
                op: sql_ast::SetOperator::Union,
                set_quantifier,
                left,
                right,
            } => Ok(SetExpr::Union {
                left: Box::new(SetExpr::from_sql_ast(*left)?),
                right: Box::new(SetExpr::from_sql_ast(*right)?),
                all: matches!(set_quantifier, sql_ast::SetQuantifier::All),
            }),
            sql_ast::SetExpr::Query(query) => {
                Ok(SetExpr::Query(Box::new(Query::from_sql_ast(*query)?)))
            }
            other => Err(ScriptError::Unsupported(format!("query body: {}", other))),
        }
    }
}

/// A SELECT block.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Whether DISTINCT is specified.
    pub distinct: bool,
    /// Selected items.
    pub projection: Vec<SelectItem>,
    /// FROM clause.
    pub from: Vec<TableWithJoins>,
    /// WHERE clause.
    pub selection: Option<Expr>,
    /// GROUP BY expressions.
    pub group_by: Vec<Expr>,
    /// HAVING clause.
    pub having: Option<Expr>,
}

impl Select {
    /// Converts from sqlparser's Select.
    pub fn from_sql_ast(select: sql_ast::Select) -> ScriptResult<Self> {
        if matches!(select.distinct, Some(sql_ast::Distinct::On(_))) {
            return Err(ScriptError::Unsupported("DISTINCT ON".to_string()));
        }

        let projection: ScriptResult<Vec<_>> = select
            .projection
            .into_iter()
            .map(SelectItem::from_sql_ast)
            .collect();

        let from: ScriptResult<Vec<_>> = select
            .from
            .into_iter()
            .map(TableWithJoins::from_sql_ast)
            .collect();

        let group_by: ScriptResult<Vec<_>> = match select.group_by {
            sql_ast::GroupByExpr::Expressions(exprs) => {
                exprs.into_iter().map(Expr::from_sql_ast).collect()
            }
            sql_ast::GroupByExpr::All => {
                return Err(ScriptError::Unsupported("GROUP BY ALL".to_string()))
            }
        };

        Ok(Self {
            distinct: select.distinct.is_some(),
            projection: projection?,
            from: from?,
            selection: select.selection.map(Expr::from_sql_ast).transpose()?,
            group_by: group_by?,
            having: select.having.map(Expr::from_sql_ast).transpose()?,
        })
    }

    /// Returns true if this select aggregates its input.
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty()
            || self.having.is_some()
            || self.projection.iter().any(|item| match item {
                SelectItem::Expr { expr, .. } => expr.contains_aggregate(),
                _ => false,
            })
    }
}

/// A selected item.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// An expression with an optional alias.
    Expr {
        /// The expression.
        expr: Expr,
        /// Optional alias.
        alias: Option<String>,
    },
    /// `*`.
    Wildcard,
    /// `table.*`.
    QualifiedWildcard(String),
}

impl SelectItem {
    /// Converts from sqlparser's SelectItem.
    pub fn from_sql_ast(item: sql_ast::SelectItem) -> ScriptResult<Self> {
        match item {
            sql_ast::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expr {
                expr: Expr::from_sql_ast(expr)?,
                alias: None,
            }),
            sql_ast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expr {
                expr: Expr::from_sql_ast(expr)?,
                alias: Some(alias.value),
            }),
            sql_ast::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
            sql_ast::SelectItem::QualifiedWildcard(name, _) => {
                Ok(SelectItem::QualifiedWildcard(object_name(&name)))
            }
        }
    }
}

/// A FROM item with its joins.
#[derive(Debug, Clone, PartialEq)]
pub struct TableWithJoins {
    /// Leftmost relation.
    pub relation: TableFactor,
    /// Joins applied left to right.
    pub joins: Vec<Join>,
}

impl TableWithJoins {
    /// Converts from sqlparser's TableWithJoins.
    pub fn from_sql_ast(table: sql_ast::TableWithJoins) -> ScriptResult<Self> {
        let joins: ScriptResult<Vec<_>> = table.joins.into_iter().map(Join::from_sql_ast).collect();
        Ok(Self {
            relation: TableFactor::from_sql_ast(table.relation)?,
            joins: joins?,
        })
    }
}

/// A relation in a FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub struct TableFactor {
    /// Where rows come from.
    pub source: TableSource,
    /// Optional alias.
    pub alias: Option<String>,
}

impl TableFactor {
    /// Returns the name columns of this relation are qualified with.
    pub fn qualifier(&self) -> Option<&str> {
        match (&self.alias, &self.source) {
            (Some(alias), _) => Some(alias),
            (None, TableSource::Named(name)) => Some(name),
            (None, TableSource::Derived(_)) => None,
        }
    }

    /// Converts from sqlparser's TableFactor.
    pub fn from_sql_ast(factor: sql_ast::TableFactor) -> ScriptResult<Self> {
        match factor {
            sql_ast::TableFactor::Table { name, alias, .. } => Ok(Self {
                source: TableSource::Named(object_name(&name)),
                alias: alias.map(|a| a.name.value),
            }),
            sql_ast::TableFactor::Derived {
                subquery, alias, ..
            } => Ok(Self {
                source: TableSource::Derived(Box::new(Query::from_sql_ast(*subquery)?)),
                alias: alias.map(|a| a.name.value),
            }),
            other => Err(ScriptError::Unsupported(format!("FROM item: {}", other))),
        }
    }
}

/// Row source of a FROM relation.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// A table bound in scope or a CTE.
    Named(String),
    /// A subquery.
    Derived(Box<Query>),
}

/// A join.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Right-hand relation.
    pub relation: TableFactor,
    /// Join kind.
    pub kind: JoinKind,
    /// ON condition; `None` joins every pair.
    pub constraint: Option<Expr>,
}

impl Join {
    /// Converts from sqlparser's Join.
    pub fn from_sql_ast(join: sql_ast::Join) -> ScriptResult<Self> {
        let (kind, constraint) = match join.join_operator {
            sql_ast::JoinOperator::Inner(c) => (JoinKind::Inner, c),
            sql_ast::JoinOperator::LeftOuter(c) => (JoinKind::Left, c),
            sql_ast::JoinOperator::RightOuter(c) => (JoinKind::Right, c),
            sql_ast::JoinOperator::FullOuter(c) => (JoinKind::Full, c),
            sql_ast::JoinOperator::CrossJoin => (JoinKind::Cross, sql_ast::JoinConstraint::None),
            other => {
                return Err(ScriptError::Unsupported(format!("join: {:?}", other)));
            }
        };

        let constraint = match constraint {
            sql_ast::JoinConstraint::On(expr) => Some(Expr::from_sql_ast(expr)?),
            sql_ast::JoinConstraint::None => None,
            other => {
                return Err(ScriptError::Unsupported(format!(
                    "join constraint: {:?}",
                    other
                )))
            }
        };

        if constraint.is_none() && !matches!(kind, JoinKind::Inner | JoinKind::Cross) {
            return Err(ScriptError::Syntax(format!("{:?} join requires ON", kind)));
        }

        Ok(Self {
            relation: TableFactor::from_sql_ast(join.relation)?,
            kind,
            constraint,
        })
    }
}

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// INNER JOIN.
    Inner,
    /// LEFT OUTER JOIN.
    Left,
    /// RIGHT OUTER JOIN.
    Right,
    /// FULL OUTER JOIN.
    Full,
    /// CROSS JOIN.
    Cross,
}

/// An ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    /// Sort key.
    pub expr: Expr,
    /// Ascending (default true).
    pub asc: bool,
    /// NULLS FIRST / NULLS LAST, if given.
    pub nulls_first: Option<bool>,
}

impl OrderByExpr {
    /// Converts from sqlparser's OrderByExpr.
    pub fn from_sql_ast(order: sql_ast::OrderByExpr) -> ScriptResult<Self> {
        Ok(Self {
            expr: Expr::from_sql_ast(order.expr)?,
            asc: order.asc.unwrap_or(true),
            nulls_first: order.nulls_first,
        })
    }

    /// Returns whether NULLs sort before other values for this key.
    ///
    /// Defaults to NULLS LAST ascending and NULLS FIRST descending.
    pub fn nulls_first(&self) -> bool {
        self.nulls_first.unwrap_or(!self.asc)
    }
}
