//! Explicit composite-key joins between independently grouped tables.

use polars::prelude::*;

/// Inner-joins `left` and `right` on the columns named in `keys`, which must
/// exist on both sides under the same names.
///
/// Rows whose key tuple has no partner on the other side are dropped, from
/// either side. Non-key columns present on both sides keep the left value;
/// the right copy is suffixed with `_right`, so callers should project the
/// right side down to keys plus the columns they want before joining.
pub fn inner_join(left: LazyFrame, right: LazyFrame, keys: &[&str]) -> LazyFrame {
    let on: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    left.join(right, &on, &on, JoinArgs::new(JoinType::Inner))
}
