//! Equality joins on a shared key column.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use tabula_common::{
    Column, Table, TabulaError, TabulaResult, Value, JOIN_LEFT_SUFFIX, JOIN_RIGHT_SUFFIX,
};

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinHow {
    /// Matching rows only.
    #[default]
    Inner,
    /// Every left row.
    Left,
    /// Every right row.
    Right,
    /// Every row of both sides.
    Outer,
}

impl JoinHow {
    /// Returns the lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            JoinHow::Inner => "inner",
            JoinHow::Left => "left",
            JoinHow::Right => "right",
            JoinHow::Outer => "outer",
        }
    }
}

impl fmt::Display for JoinHow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinHow {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinHow::Inner),
            "left" => Ok(JoinHow::Left),
            "right" => Ok(JoinHow::Right),
            "outer" => Ok(JoinHow::Outer),
            _ => Err(TabulaError::invalid_argument(format!(
                "invalid join type '{}'; expected inner, left, right or outer",
                s
            ))),
        }
    }
}

/// Pairs of (left row, right row); `None` marks the missing side.
type RowPairs = Vec<(Option<usize>, Option<usize>)>;

/// Joins `left` and `right` on equal values of column `on`.
///
/// The key appears once, followed by the remaining left columns and then
/// the remaining right columns. Names present on both sides get `_x` and
/// `_y` suffixes. NULL keys never match.
pub fn join(left: &Table, right: &Table, on: &str, how: JoinHow) -> TabulaResult<Table> {
    let left_key = left.require_column(on)?;
    let right_key = right.require_column(on)?;

    let pairs: RowPairs = match how {
        JoinHow::Right => match_rows(right_key, left_key, true)
            .into_iter()
            .map(|(r, l)| (l, r))
            .collect(),
        JoinHow::Inner => match_rows(left_key, right_key, false)
            .into_iter()
            .filter(|(_, r)| r.is_some())
            .collect(),
        JoinHow::Left => match_rows(left_key, right_key, true),
        JoinHow::Outer => {
            let mut pairs = match_rows(left_key, right_key, true);
            let matched: HashSet<usize> = pairs.iter().filter_map(|(_, r)| *r).collect();
            pairs.extend(
                (0..right.num_rows())
                    .filter(|r| !matched.contains(r))
                    .map(|r| (None, Some(r))),
            );
            pairs
        }
    };

    tracing::debug!(on, how = %how, rows = pairs.len(), "join matched");
    build_output(left, right, on, &pairs)
}

/// For each row of `outer` in order, pairs it with every matching row of
/// `inner` in order. With `keep_unmatched`, outer rows without a match are
/// paired with `None`.
fn match_rows(outer: &Column, inner: &Column, keep_unmatched: bool) -> RowPairs {
    let mut index: HashMap<&Value, Vec<usize>> = HashMap::new();
    for (row, value) in inner.values().iter().enumerate() {
        if !value.is_null() {
            index.entry(value).or_default().push(row);
        }
    }

    let mut pairs = Vec::new();
    for (row, value) in outer.values().iter().enumerate() {
        match index.get(value).filter(|_| !value.is_null()) {
            Some(matches) => pairs.extend(matches.iter().map(|&m| (Some(row), Some(m)))),
            None if keep_unmatched => pairs.push((Some(row), None)),
            None => {}
        }
    }
    pairs
}

fn build_output(left: &Table, right: &Table, on: &str, pairs: &RowPairs) -> TabulaResult<Table> {
    let left_key = left.require_column(on)?;
    let right_key = right.require_column(on)?;

    let pick = |col: &Column, row: Option<usize>| row.map_or(Value::Null, |r| col.get(r).clone());

    let key_values = pairs
        .iter()
        .map(|&(l, r)| match l {
            Some(l) => left_key.get(l).clone(),
            None => pick(right_key, r),
        })
        .collect();
    let mut columns = vec![Column::from_values_with_hint(
        on,
        left_key.data_type().unify(right_key.data_type()),
        key_values,
    )];

    let left_rest: Vec<&Column> = left.columns().iter().filter(|c| c.name() != on).collect();
    let right_rest: Vec<&Column> = right.columns().iter().filter(|c| c.name() != on).collect();
    let left_names: HashSet<&str> = left_rest.iter().map(|c| c.name()).collect();
    let right_names: HashSet<&str> = right_rest.iter().map(|c| c.name()).collect();

    for col in &left_rest {
        let name = if right_names.contains(col.name()) {
            format!("{}{}", col.name(), JOIN_LEFT_SUFFIX)
        } else {
            col.name().to_string()
        };
        let values = pairs.iter().map(|&(l, _)| pick(col, l)).collect();
        columns.push(Column::from_values_with_hint(name, col.data_type(), values));
    }

    for col in &right_rest {
        let name = if left_names.contains(col.name()) {
            format!("{}{}", col.name(), JOIN_RIGHT_SUFFIX)
        } else {
            col.name().to_string()
        };
        let values = pairs.iter().map(|&(_, r)| pick(col, r)).collect();
        columns.push(Column::from_values_with_hint(name, col.data_type(), values));
    }

    Table::new(columns)
}
