//! Statement and query execution.

use std::collections::HashMap;

use tabula_common::{Table, Value, DEFAULT_MAX_SCRIPT_ROWS, DEFAULT_MAX_SCRIPT_STATEMENTS, RESULT_BINDING};

use super::aggregate::{Accumulator, AggregateFunc};
use super::evaluator::{evaluate, predicate, EmptyContext, RowContext, RowRef};
use super::relation::{try_resolve, ColumnMeta, Relation};
use super::scope::Scope;
use crate::error::{ScriptError, ScriptResult};
use crate::parser::{
    ColumnRef, Expr, FunctionCall, Join, JoinKind, OrderByExpr, Parser, Query, Select, SelectItem,
    SetExpr, Statement, TableFactor, TableSource, TableWithJoins,
};

/// Resource limits for one script run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    /// Maximum number of statements in a script.
    pub max_statements: usize,
    /// Maximum number of rows any intermediate or bound table may hold.
    pub max_rows: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_statements: DEFAULT_MAX_SCRIPT_STATEMENTS,
            max_rows: DEFAULT_MAX_SCRIPT_ROWS,
        }
    }
}

/// Runs scripts against a [`Scope`].
#[derive(Debug, Clone, Default)]
pub struct ScriptEngine {
    limits: ScriptLimits,
}

impl ScriptEngine {
    /// Creates an engine with the given limits.
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    /// Returns the limits.
    pub fn limits(&self) -> ScriptLimits {
        self.limits
    }

    /// Parses and runs a script, statement by statement.
    ///
    /// Statements see the effects of earlier ones. On error the scope holds
    /// whatever earlier statements left in it. Returns the number of
    /// statements executed.
    pub fn run(&self, source: &str, scope: &mut Scope) -> ScriptResult<usize> {
        let statements = Parser::parse(source)?;
        if statements.len() > self.limits.max_statements {
            return Err(ScriptError::LimitExceeded(format!(
                "script has {} statements, the limit is {}",
                statements.len(),
                self.limits.max_statements
            )));
        }

        for (i, stmt) in statements.iter().enumerate() {
            tracing::debug!(statement = i + 1, kind = stmt.kind(), "executing");
            self.execute(stmt, scope)?;
        }
        Ok(statements.len())
    }

    /// Runs a single query and returns its result without binding it.
    pub fn query(&self, sql: &str, scope: &Scope) -> ScriptResult<Table> {
        let mut statements = Parser::parse(sql)?;
        match (statements.pop(), statements.is_empty()) {
            (Some(Statement::Select { query, into: None }), true) => {
                let env = Env::root(scope);
                self.eval_query(&query, &env)?.into_table()
            }
            _ => Err(ScriptError::InvalidArgument(
                "expected a single SELECT query".to_string(),
            )),
        }
    }

    /// Executes one statement.
    pub fn execute(&self, stmt: &Statement, scope: &mut Scope) -> ScriptResult<()> {
        match stmt {
            Statement::Select { query, into } => {
                let table = self.eval_query(query, &Env::root(scope))?.into_table()?;
                self.check_rows(table.num_rows())?;
                let name = into.as_deref().unwrap_or(RESULT_BINDING);
                scope.bind(name, table);
                Ok(())
            }
            Statement::CreateTableAs {
                name,
                query,
                or_replace,
                if_not_exists,
            } => {
                if scope.contains(name) && !*or_replace {
                    return if *if_not_exists {
                        Ok(())
                    } else {
                        Err(ScriptError::TableExists(name.clone()))
                    };
                }
                let table = self.eval_query(query, &Env::root(scope))?.into_table()?;
                self.check_rows(table.num_rows())?;
                scope.bind(name.clone(), table);
                Ok(())
            }
            Statement::CreateTable {
                name,
                fields,
                or_replace,
                if_not_exists,
            } => {
                if scope.contains(name) && !*or_replace {
                    return if *if_not_exists {
                        Ok(())
                    } else {
                        Err(ScriptError::TableExists(name.clone()))
                    };
                }
                scope.bind(name.clone(), Table::empty(fields)?);
                Ok(())
            }
            Statement::Insert {
                table,
                columns,
                source,
            } => self.insert(table, columns, source, scope),
            Statement::Update {
                table,
                assignments,
                selection,
            } => {
                let target = scope
                    .get(table)
                    .ok_or_else(|| ScriptError::UnknownTable(table.clone()))?;
                let rel = Relation::from_table(target, Some(table.as_str()));

                for a in assignments {
                    if !target.has_column(&a.column) {
                        return Err(ScriptError::UnknownColumn(a.column.clone()));
                    }
                }

                // Every assignment reads the row as it was before the update.
                let mut updates = Vec::new();
                for (i, row) in rel.rows.iter().enumerate() {
                    let ctx = RowRef::new(&rel.columns, row);
                    if let Some(cond) = selection {
                        if !predicate(cond, &ctx)? {
                            continue;
                        }
                    }
                    for a in assignments {
                        updates.push((i, a.column.as_str(), evaluate(&a.value, &ctx)?));
                    }
                }

                if let Some(target) = scope.get_mut(table) {
                    for (i, column, value) in updates {
                        if let Some(col) = target.column_mut(column) {
                            col.set(i, value);
                        }
                    }
                }
                Ok(())
            }
            Statement::Delete { table, selection } => {
                let target = scope
                    .get(table)
                    .ok_or_else(|| ScriptError::UnknownTable(table.clone()))?;
                let kept = match selection {
                    None => target.head(0),
                    Some(cond) => {
                        let rel = Relation::from_table(target, Some(table.as_str()));
                        let mut keep = Vec::new();
                        for (i, row) in rel.rows.iter().enumerate() {
                            if !predicate(cond, &RowRef::new(&rel.columns, row))? {
                                keep.push(i);
                            }
                        }
                        target.take(&keep)
                    }
                };
                scope.bind(table.clone(), kept);
                Ok(())
            }
            Statement::DropTable { names, if_exists } => {
                for name in names {
                    if scope.remove(name).is_none() && !*if_exists {
                        return Err(ScriptError::UnknownTable(name.clone()));
                    }
                }
                Ok(())
            }
        }
    }

    fn insert(
        &self,
        table: &str,
        columns: &[String],
        source: &Query,
        scope: &mut Scope,
    ) -> ScriptResult<()> {
        let rel = self.eval_query(source, &Env::root(scope))?;

        let target = scope
            .get_mut(table)
            .ok_or_else(|| ScriptError::UnknownTable(table.to_string()))?;

        let positions: Vec<usize> = if columns.is_empty() {
            (0..target.num_columns()).collect()
        } else {
            columns
                .iter()
                .map(|c| {
                    target
                        .column_index(c)
                        .ok_or_else(|| ScriptError::UnknownColumn(c.clone()))
                })
                .collect::<ScriptResult<_>>()?
        };

        if rel.columns.len() != positions.len() {
            return Err(ScriptError::InvalidArgument(format!(
                "INSERT has {} target columns but {} values per row",
                positions.len(),
                rel.columns.len()
            )));
        }

        self.check_rows(target.num_rows() + rel.num_rows())?;

        let width = target.num_columns();
        for source_row in rel.rows {
            let mut row = vec![Value::Null; width];
            for (value, &pos) in source_row.into_iter().zip(&positions) {
                row[pos] = value;
            }
            target.push_row(row)?;
        }
        Ok(())
    }

    fn check_rows(&self, rows: usize) -> ScriptResult<()> {
        if rows > self.limits.max_rows {
            return Err(ScriptError::LimitExceeded(format!(
                "{} rows exceeds the limit of {}",
                rows, self.limits.max_rows
            )));
        }
        Ok(())
    }

    fn eval_query(&self, query: &Query, env: &Env<'_>) -> ScriptResult<Relation> {
        if !query.ctes.is_empty() {
            let mut child = env.child();
            for cte in &query.ctes {
                let table = self.eval_query(&cte.query, &child)?.into_table()?;
                child.ctes.insert(cte.name.clone(), table);
            }
            return self.eval_query_body(query, &child);
        }
        self.eval_query_body(query, env)
    }

    fn eval_query_body(&self, query: &Query, env: &Env<'_>) -> ScriptResult<Relation> {
        let mut rel = match &query.body {
            SetExpr::Select(select) => self.eval_select(select, &query.order_by, env)?,
            other => {
                let rel = self.eval_set_expr(other, env)?;
                sort_output(rel, &query.order_by)?
            }
        };

        let offset = paging_value(query.offset.as_ref(), "OFFSET")?.unwrap_or(0);
        let limit = paging_value(query.limit.as_ref(), "LIMIT")?;
        if offset > 0 || limit.is_some() {
            let rows = std::mem::take(&mut rel.rows);
            rel.rows = rows
                .into_iter()
                .skip(offset)
                .take(limit.unwrap_or(usize::MAX))
                .collect();
        }
        Ok(rel)
    }

    fn eval_set_expr(&self, body: &SetExpr, env: &Env<'_>) -> ScriptResult<Relation> {
        match body {
            SetExpr::Select(select) => self.eval_select(select, &[], env),
            SetExpr::Query(query) => self.eval_query(query, env),
            SetExpr::Values(rows) => {
                let width = rows.first().map_or(0, Vec::len);
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    if row.len() != width {
                        return Err(ScriptError::InvalidArgument(
                            "VALUES rows must all have the same length".to_string(),
                        ));
                    }
                    out.push(
                        row.iter()
                            .map(|e| evaluate(e, &EmptyContext))
                            .collect::<ScriptResult<Vec<_>>>()?,
                    );
                }
                self.check_rows(out.len())?;
                let columns = (1..=width)
                    .map(|i| ColumnMeta::new(format!("column{}", i)))
                    .collect();
                Ok(Relation::new(columns, out))
            }
            SetExpr::Union { left, right, all } => {
                let mut left = self.eval_set_expr(left, env)?;
                let right = self.eval_set_expr(right, env)?;
                if left.columns.len() != right.columns.len() {
                    return Err(ScriptError::InvalidArgument(format!(
                        "UNION sides have {} and {} columns",
                        left.columns.len(),
                        right.columns.len()
                    )));
                }
                self.check_rows(left.num_rows() + right.num_rows())?;
                for meta in &mut left.columns {
                    meta.qualifier = None;
                    meta.data_type = None;
                }
                left.rows.extend(right.rows);
                if !*all {
                    left.dedup();
                }
                Ok(left)
            }
        }
    }

    fn eval_select(
        &self,
        select: &Select,
        order_by: &[OrderByExpr],
        env: &Env<'_>,
    ) -> ScriptResult<Relation> {
        let mut source = self.eval_from(&select.from, env)?;

        if let Some(cond) = &select.selection {
            let columns = &source.columns;
            let mut kept = Vec::with_capacity(source.rows.len());
            for row in std::mem::take(&mut source.rows) {
                if predicate(cond, &RowRef::new(columns, &row))? {
                    kept.push(row);
                }
            }
            source.rows = kept;
        }

        let mut output = if select.is_aggregate() {
            self.project_groups(select, order_by, &source)?
        } else {
            project_rows(select, order_by, &source)?
        };

        if select.distinct {
            let mut seen = std::collections::HashSet::with_capacity(output.rows.len());
            output.rows.retain(|(row, _)| seen.insert(row.clone()));
        }

        Ok(output.into_sorted(order_by))
    }

    fn eval_from(&self, from: &[TableWithJoins], env: &Env<'_>) -> ScriptResult<Relation> {
        let mut result: Option<Relation> = None;
        for item in from {
            let mut rel = self.eval_factor(&item.relation, env)?;
            for join in &item.joins {
                let right = self.eval_factor(&join.relation, env)?;
                rel = self.join(rel, right, join)?;
            }
            result = Some(match result {
                None => rel,
                Some(left) => self.join_relations(left, rel, JoinKind::Cross, None)?,
            });
        }
        Ok(result.unwrap_or_else(Relation::unit))
    }

    fn eval_factor(&self, factor: &TableFactor, env: &Env<'_>) -> ScriptResult<Relation> {
        match &factor.source {
            TableSource::Named(name) => {
                let table = env
                    .lookup(name)
                    .ok_or_else(|| ScriptError::UnknownTable(name.clone()))?;
                Ok(Relation::from_table(table, factor.qualifier()))
            }
            TableSource::Derived(query) => {
                let mut rel = self.eval_query(query, env)?;
                rel.requalify(factor.alias.as_deref());
                Ok(rel)
            }
        }
    }

    fn join(&self, left: Relation, right: Relation, join: &Join) -> ScriptResult<Relation> {
        self.join_relations(left, right, join.kind, join.constraint.as_ref())
    }

    /// Nested-loop join. Matches come out in left row order; unmatched
    /// right rows of RIGHT and FULL joins follow in right row order.
    fn join_relations(
        &self,
        left: Relation,
        right: Relation,
        kind: JoinKind,
        on: Option<&Expr>,
    ) -> ScriptResult<Relation> {
        let left_width = left.columns.len();
        let mut columns = left.columns;
        columns.extend(right.columns);

        let mut rows = Vec::new();
        let mut right_matched = vec![false; right.rows.len()];

        for l in &left.rows {
            let mut matched = false;
            for (j, r) in right.rows.iter().enumerate() {
                let mut row = Vec::with_capacity(columns.len());
                row.extend_from_slice(l);
                row.extend_from_slice(r);

                let keep = match on {
                    Some(cond) => predicate(cond, &RowRef::new(&columns, &row))?,
                    None => true,
                };
                if keep {
                    matched = true;
                    right_matched[j] = true;
                    rows.push(row);
                    self.check_rows(rows.len())?;
                }
            }
            if !matched && matches!(kind, JoinKind::Left | JoinKind::Full) {
                let mut row = l.clone();
                row.resize(columns.len(), Value::Null);
                rows.push(row);
                self.check_rows(rows.len())?;
            }
        }

        if matches!(kind, JoinKind::Right | JoinKind::Full) {
            for (r, matched) in right.rows.iter().zip(&right_matched) {
                if !matched {
                    let mut row = vec![Value::Null; left_width];
                    row.extend_from_slice(r);
                    rows.push(row);
                    self.check_rows(rows.len())?;
                }
            }
        }

        Ok(Relation::new(columns, rows))
    }

    fn project_groups(
        &self,
        select: &Select,
        order_by: &[OrderByExpr],
        source: &Relation,
    ) -> ScriptResult<Projected> {
        let group_exprs: Vec<&Expr> = select
            .group_by
            .iter()
            .map(|e| group_expr(e, select, source))
            .collect::<ScriptResult<_>>()?;

        let mut calls: Vec<FunctionCall> = Vec::new();
        for item in &select.projection {
            if let SelectItem::Expr { expr, .. } = item {
                expr.collect_aggregates(&mut calls);
            }
        }
        if let Some(having) = &select.having {
            having.collect_aggregates(&mut calls);
        }
        for o in order_by {
            o.expr.collect_aggregates(&mut calls);
        }

        let aggregates: Vec<(AggregateFunc, &FunctionCall)> = calls
            .iter()
            .map(|call| {
                let func = call.aggregate().ok_or_else(|| {
                    ScriptError::InvalidArgument(format!("{}() is not an aggregate", call.name))
                })?;
                if func != AggregateFunc::CountAll && call.args.len() != 1 {
                    return Err(ScriptError::InvalidArgument(format!(
                        "{}() takes exactly one argument",
                        call.name
                    )));
                }
                if let Some(arg) = call.args.first() {
                    if arg.contains_aggregate() {
                        return Err(ScriptError::InvalidArgument(format!(
                            "aggregate calls cannot be nested in {}()",
                            call.name
                        )));
                    }
                }
                Ok((func, call))
            })
            .collect::<ScriptResult<_>>()?;

        // Groups in order of first appearance.
        let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for (row_idx, row) in source.rows.iter().enumerate() {
            let ctx = RowRef::new(&source.columns, row);
            let key = group_exprs
                .iter()
                .map(|e| evaluate(e, &ctx))
                .collect::<ScriptResult<Vec<_>>>()?;

            let g = match index.get(&key) {
                Some(&g) => g,
                None => {
                    groups.push(Group::new(Some(row_idx), &aggregates));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            for (acc, (func, call)) in groups[g].accumulators.iter_mut().zip(&aggregates) {
                let value = match func {
                    AggregateFunc::CountAll => Value::Null,
                    _ => evaluate(&call.args[0], &ctx)?,
                };
                acc.update(&value)?;
            }
        }

        if groups.is_empty() && select.group_by.is_empty() {
            groups.push(Group::new(None, &aggregates));
        }

        let mut output = Projected::new(output_columns(select, source)?);
        let empty_row: Vec<Value> = vec![Value::Null; source.columns.len()];

        for group in &groups {
            let row = group.row.map_or(empty_row.as_slice(), |i| source.rows[i].as_slice());
            let values: Vec<Value> = group.accumulators.iter().map(Accumulator::finish).collect();
            let ctx = GroupContext {
                row: RowRef::new(&source.columns, row),
                calls: &calls,
                values: &values,
            };

            if let Some(having) = &select.having {
                if !predicate(having, &ctx)? {
                    continue;
                }
            }
            output.push_row(select, &source.columns, row, &ctx, order_by)?;
        }
        Ok(output)
    }
}

/// Resolves `GROUP BY` items that name an output position or alias.
fn group_expr<'a>(expr: &'a Expr, select: &'a Select, source: &Relation) -> ScriptResult<&'a Expr> {
    match expr {
        Expr::Literal(Value::Int(pos)) => {
            let item = usize::try_from(*pos)
                .ok()
                .and_then(|p| p.checked_sub(1))
                .and_then(|p| select.projection.get(p));
            match item {
                Some(SelectItem::Expr { expr, .. }) => Ok(expr),
                _ => Err(ScriptError::InvalidArgument(format!(
                    "GROUP BY position {} is not a select expression",
                    pos
                ))),
            }
        }
        Expr::Column(col) if col.table.is_none() && try_resolve(&source.columns, col)?.is_none() => {
            let aliased = select.projection.iter().find_map(|item| match item {
                SelectItem::Expr {
                    expr,
                    alias: Some(alias),
                } if *alias == col.column => Some(expr),
                _ => None,
            });
            Ok(aliased.unwrap_or(expr))
        }
        _ => Ok(expr),
    }
}

/// Computes the output columns of a select's projection.
fn output_columns(select: &Select, source: &Relation) -> ScriptResult<Vec<ColumnMeta>> {
    let mut columns = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard => {
                columns.extend(source.columns.iter().cloned());
            }
            SelectItem::QualifiedWildcard(q) => {
                let before = columns.len();
                columns.extend(
                    source
                        .columns
                        .iter()
                        .filter(|m| m.qualifier.as_deref() == Some(q))
                        .cloned(),
                );
                if columns.len() == before {
                    return Err(ScriptError::UnknownTable(q.clone()));
                }
            }
            SelectItem::Expr { expr, alias } => {
                let data_type = match expr {
                    Expr::Column(col) => try_resolve(&source.columns, col)
                        .ok()
                        .flatten()
                        .and_then(|i| source.columns[i].data_type),
                    _ => None,
                };
                columns.push(ColumnMeta {
                    qualifier: None,
                    name: alias.clone().unwrap_or_else(|| expr.output_name()),
                    data_type,
                });
            }
        }
    }
    Ok(columns)
}

fn project_rows(
    select: &Select,
    order_by: &[OrderByExpr],
    source: &Relation,
) -> ScriptResult<Projected> {
    let mut output = Projected::new(output_columns(select, source)?);
    for row in &source.rows {
        let ctx = RowRef::new(&source.columns, row);
        output.push_row(select, &source.columns, row, &ctx, order_by)?;
    }
    Ok(output)
}

/// Sorts the output of a non-SELECT query body.
fn sort_output(rel: Relation, order_by: &[OrderByExpr]) -> ScriptResult<Relation> {
    if order_by.is_empty() {
        return Ok(rel);
    }
    let mut projected = Projected::new(rel.columns);
    for row in rel.rows {
        let keys = order_keys(order_by, &projected.columns, &row, &EmptyContext)?;
        projected.rows.push((row, keys));
    }
    Ok(projected.into_sorted(order_by))
}

/// Output rows paired with their sort keys.
struct Projected {
    columns: Vec<ColumnMeta>,
    rows: Vec<(Vec<Value>, Vec<Value>)>,
}

impl Projected {
    fn new(columns: Vec<ColumnMeta>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Projects one source row. Wildcards copy `row` by position, so
    /// duplicate column names never read as ambiguous.
    fn push_row(
        &mut self,
        select: &Select,
        columns: &[ColumnMeta],
        row: &[Value],
        ctx: &dyn RowContext,
        order_by: &[OrderByExpr],
    ) -> ScriptResult<()> {
        let mut out = Vec::with_capacity(self.columns.len());
        for item in &select.projection {
            match item {
                SelectItem::Wildcard => out.extend_from_slice(row),
                SelectItem::QualifiedWildcard(q) => {
                    out.extend(
                        columns
                            .iter()
                            .zip(row)
                            .filter(|(m, _)| m.qualifier.as_deref() == Some(q))
                            .map(|(_, v)| v.clone()),
                    );
                }
                SelectItem::Expr { expr, .. } => out.push(evaluate(expr, ctx)?),
            }
        }
        let keys = order_keys(order_by, &self.columns, &out, ctx)?;
        self.rows.push((out, keys));
        Ok(())
    }

    fn into_sorted(mut self, order_by: &[OrderByExpr]) -> Relation {
        if !order_by.is_empty() {
            self.rows.sort_by(|(_, a), (_, b)| {
                for ((x, y), o) in a.iter().zip(b).zip(order_by) {
                    let ord = match (x.is_null(), y.is_null()) {
                        (true, true) => std::cmp::Ordering::Equal,
                        (true, false) if o.nulls_first() => std::cmp::Ordering::Less,
                        (true, false) => std::cmp::Ordering::Greater,
                        (false, true) if o.nulls_first() => std::cmp::Ordering::Greater,
                        (false, true) => std::cmp::Ordering::Less,
                        (false, false) if o.asc => x.cmp(y),
                        (false, false) => y.cmp(x),
                    };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }
        Relation::new(
            self.columns,
            self.rows.into_iter().map(|(row, _)| row).collect(),
        )
    }
}

/// Computes ORDER BY keys for one output row.
///
/// Bare names matching an output column and integer positions refer to
/// the output row; everything else is evaluated against `source`.
fn order_keys(
    order_by: &[OrderByExpr],
    columns: &[ColumnMeta],
    output: &[Value],
    source: &dyn RowContext,
) -> ScriptResult<Vec<Value>> {
    let ctx = OutputContext {
        columns,
        output,
        source,
    };
    order_by
        .iter()
        .map(|o| match &o.expr {
            Expr::Literal(Value::Int(pos)) => usize::try_from(*pos)
                .ok()
                .and_then(|p| p.checked_sub(1))
                .and_then(|p| output.get(p))
                .cloned()
                .ok_or_else(|| {
                    ScriptError::InvalidArgument(format!("ORDER BY position {} is out of range", pos))
                }),
            expr => evaluate(expr, &ctx),
        })
        .collect()
}

/// Resolves unqualified names against the output row first.
struct OutputContext<'a> {
    columns: &'a [ColumnMeta],
    output: &'a [Value],
    source: &'a dyn RowContext,
}

impl RowContext for OutputContext<'_> {
    fn column(&self, col: &ColumnRef) -> ScriptResult<Value> {
        if col.table.is_none() {
            if let Some(i) = self.columns.iter().position(|m| m.name == col.column) {
                return Ok(self.output[i].clone());
            }
        }
        self.source.column(col)
    }

    fn aggregate(&self, call: &FunctionCall) -> Option<Value> {
        self.source.aggregate(call)
    }
}

struct Group {
    row: Option<usize>,
    accumulators: Vec<Accumulator>,
}

impl Group {
    fn new(row: Option<usize>, aggregates: &[(AggregateFunc, &FunctionCall)]) -> Self {
        Self {
            row,
            accumulators: aggregates
                .iter()
                .map(|(func, call)| Accumulator::new(*func, call.distinct))
                .collect(),
        }
    }
}

/// A group's representative row plus its aggregate results.
struct GroupContext<'a> {
    row: RowRef<'a>,
    calls: &'a [FunctionCall],
    values: &'a [Value],
}

impl RowContext for GroupContext<'_> {
    fn column(&self, col: &ColumnRef) -> ScriptResult<Value> {
        self.row.column(col)
    }

    fn aggregate(&self, call: &FunctionCall) -> Option<Value> {
        self.calls
            .iter()
            .position(|c| c == call)
            .map(|i| self.values[i].clone())
    }
}

fn paging_value(expr: Option<&Expr>, clause: &str) -> ScriptResult<Option<usize>> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match evaluate(expr, &EmptyContext)? {
        Value::Null => Ok(None),
        Value::Int(n) if n >= 0 => Ok(Some(usize::try_from(n).unwrap_or(usize::MAX))),
        other => Err(ScriptError::InvalidArgument(format!(
            "{} must be a non-negative integer, got {}",
            clause, other
        ))),
    }
}

/// Lexical environment: CTEs shadow outer CTEs, which shadow the scope.
struct Env<'a> {
    scope: &'a Scope,
    ctes: HashMap<String, Table>,
    outer: Option<&'a Env<'a>>,
}

impl<'a> Env<'a> {
    fn root(scope: &'a Scope) -> Self {
        Self {
            scope,
            ctes: HashMap::new(),
            outer: None,
        }
    }

    fn child(&'a self) -> Env<'a> {
        Env {
            scope: self.scope,
            ctes: HashMap::new(),
            outer: Some(self),
        }
    }

    fn lookup(&self, name: &str) -> Option<&Table> {
        if let Some(t) = self.ctes.get(name) {
            return Some(t);
        }
        match self.outer {
            Some(outer) => outer.lookup(name),
            None => self.scope.get(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_common::{DataType, Field};

    fn scope() -> Scope {
        let users = Table::from_rows(
            &[
                Field::new("user_id", DataType::Integer),
                Field::new("name", DataType::Text),
                Field::new("city", DataType::Text),
            ],
            vec![
                vec![Value::Int(1), Value::text("Alice"), Value::text("New York")],
                vec![Value::Int(2), Value::text("Bob"), Value::text("London")],
                vec![Value::Int(3), Value::text("Charlie"), Value::text("Paris")],
                vec![Value::Int(4), Value::text("David"), Value::text("London")],
            ],
        )
        .unwrap();
        let orders = Table::from_rows(
            &[
                Field::new("order_id", DataType::Integer),
                Field::new("user_id", DataType::Integer),
                Field::new("amount", DataType::Float),
            ],
            vec![
                vec![Value::Int(101), Value::Int(1), Value::Float(1200.0)],
                vec![Value::Int(102), Value::Int(2), Value::Float(75.0)],
                vec![Value::Int(103), Value::Int(1), Value::Float(25.0)],
                vec![Value::Int(104), Value::Int(3), Value::Float(300.0)],
            ],
        )
        .unwrap();

        let mut scope = Scope::new();
        scope.bind("users", users);
        scope.bind("orders", orders);
        scope
    }

    fn query(sql: &str) -> Table {
        ScriptEngine::default().query(sql, &scope()).unwrap()
    }

    fn column(table: &Table, name: &str) -> Vec<Value> {
        table.column(name).unwrap().values().to_vec()
    }

    #[test]
    fn test_filter_and_project() {
        let t = query("SELECT name, city FROM users WHERE city = 'London'");
        assert_eq!(t.column_names(), vec!["name", "city"]);
        assert_eq!(column(&t, "name"), vec![Value::text("Bob"), Value::text("David")]);
    }

    #[test]
    fn test_wildcard_keeps_types() {
        let t = query("SELECT * FROM orders WHERE amount < 100");
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.column("amount").unwrap().data_type(), DataType::Float);
    }

    #[test]
    fn test_group_by_with_order() {
        let t = query(
            "SELECT user_id, SUM(amount) AS total, COUNT(*) AS n FROM orders \
             GROUP BY user_id ORDER BY total DESC",
        );
        assert_eq!(column(&t, "user_id"), vec![Value::Int(1), Value::Int(3), Value::Int(2)]);
        assert_eq!(
            column(&t, "total"),
            vec![Value::Float(1225.0), Value::Float(300.0), Value::Float(75.0)]
        );
        assert_eq!(column(&t, "n"), vec![Value::Int(2), Value::Int(1), Value::Int(1)]);
    }

    #[test]
    fn test_aggregate_without_rows() {
        let t = query("SELECT COUNT(*) AS n, SUM(amount) AS s FROM orders WHERE amount > 1e6");
        assert_eq!(t.num_rows(), 1);
        assert_eq!(column(&t, "n"), vec![Value::Int(0)]);
        assert_eq!(column(&t, "s"), vec![Value::Null]);
    }

    #[test]
    fn test_having() {
        let t = query("SELECT user_id FROM orders GROUP BY user_id HAVING COUNT(*) > 1");
        assert_eq!(column(&t, "user_id"), vec![Value::Int(1)]);
    }

    #[test]
    fn test_left_join() {
        let t = query(
            "SELECT u.name, o.amount FROM users u LEFT JOIN orders o ON u.user_id = o.user_id \
             ORDER BY u.user_id, o.order_id",
        );
        assert_eq!(t.num_rows(), 5);
        assert_eq!(column(&t, "amount")[4], Value::Null);
        assert_eq!(column(&t, "name")[4], Value::text("David"));
    }

    #[test]
    fn test_full_join_keeps_unmatched() {
        let t = query(
            "SELECT u.name, o.order_id FROM users u FULL JOIN orders o ON u.user_id = o.user_id + 10",
        );
        assert_eq!(t.num_rows(), 8);
    }

    #[test]
    fn test_ambiguous_column() {
        let err = ScriptEngine::default()
            .query(
                "SELECT user_id FROM users JOIN orders ON users.user_id = orders.user_id",
                &scope(),
            )
            .unwrap_err();
        assert!(matches!(err, ScriptError::AmbiguousColumn(_)));
    }

    #[test]
    fn test_order_by_hidden_column_and_limit() {
        let t = query("SELECT name FROM users ORDER BY user_id DESC LIMIT 2 OFFSET 1");
        assert_eq!(column(&t, "name"), vec![Value::text("Charlie"), Value::text("Bob")]);
    }

    #[test]
    fn test_distinct_and_union() {
        let t = query("SELECT DISTINCT city FROM users ORDER BY 1");
        assert_eq!(t.num_rows(), 3);

        let t = query("SELECT city FROM users UNION SELECT 'Tokyo'");
        assert_eq!(t.num_rows(), 4);

        let t = query("SELECT city FROM users UNION ALL SELECT city FROM users");
        assert_eq!(t.num_rows(), 8);
    }

    #[test]
    fn test_cte_and_subquery() {
        let t = query(
            "WITH big AS (SELECT * FROM orders WHERE amount > 100) \
             SELECT n FROM (SELECT COUNT(*) AS n FROM big) AS s",
        );
        assert_eq!(column(&t, "n"), vec![Value::Int(2)]);
    }

    #[test]
    fn test_run_binds_outputs() {
        let mut scope = scope();
        let engine = ScriptEngine::default();
        let n = engine
            .run(
                "CREATE TABLE london AS SELECT * FROM users WHERE city = 'London'; \
                 UPDATE london SET city = 'LDN' WHERE name = 'Bob'; \
                 DELETE FROM london WHERE name = 'David'; \
                 INSERT INTO london (user_id, name) VALUES (9, 'Zed'); \
                 SELECT COUNT(*) AS n FROM london",
                &mut scope,
            )
            .unwrap();
        assert_eq!(n, 5);

        let london = scope.get("london").unwrap();
        assert_eq!(column(london, "city"), vec![Value::text("LDN"), Value::Null]);
        assert_eq!(column(scope.get("result").unwrap(), "n"), vec![Value::Int(2)]);
    }

    #[test]
    fn test_create_existing_table_fails() {
        let mut scope = scope();
        let err = ScriptEngine::default()
            .run("CREATE TABLE users AS SELECT 1", &mut scope)
            .unwrap_err();
        assert_eq!(err, ScriptError::TableExists("users".to_string()));

        ScriptEngine::default()
            .run("CREATE TABLE IF NOT EXISTS users AS SELECT 1", &mut scope)
            .unwrap();
        assert_eq!(scope.get("users").unwrap().num_rows(), 4);
    }

    #[test]
    fn test_drop_table() {
        let mut scope = scope();
        let engine = ScriptEngine::default();
        engine.run("DROP TABLE orders", &mut scope).unwrap();
        assert!(!scope.contains("orders"));
        assert!(engine.run("DROP TABLE orders", &mut scope).is_err());
        engine.run("DROP TABLE IF EXISTS orders", &mut scope).unwrap();
    }

    #[test]
    fn test_limits() {
        let engine = ScriptEngine::new(ScriptLimits {
            max_statements: 1,
            max_rows: 10,
        });
        let mut scope = scope();
        let err = engine.run("SELECT 1; SELECT 2", &mut scope).unwrap_err();
        assert!(matches!(err, ScriptError::LimitExceeded(_)));

        let err = engine
            .run("SELECT * FROM users CROSS JOIN orders", &mut scope)
            .unwrap_err();
        assert!(matches!(err, ScriptError::LimitExceeded(_)));
    }

    #[test]
    fn test_unknown_table() {
        let err = ScriptEngine::default()
            .query("SELECT * FROM nope", &scope())
            .unwrap_err();
        assert_eq!(err, ScriptError::UnknownTable("nope".to_string()));
    }
}
