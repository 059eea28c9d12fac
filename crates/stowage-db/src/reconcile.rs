//! Column reconciliation between a source and a destination table.

use stowage_core::{ColumnPlan, ColumnSet, SourceExpr, TimeLiteral};

/// Compute the column plan for copying `source` into `destination`.
///
/// Intersected columns come first, in destination catalog order, so the plan
/// is deterministic for a given pair of schemas. Each synthesized column that
/// exists in the destination is then appended with its literal, whether or not
/// the source also has it; a synthesized column is never copied from the
/// source, so it appears exactly once.
///
/// An empty plan means there is nothing to copy.
pub fn reconcile(
    source: &ColumnSet,
    destination: &ColumnSet,
    synthesized: &[(String, TimeLiteral)],
) -> ColumnPlan {
    let is_synthesized = |column: &str| synthesized.iter().any(|(name, _)| name == column);

    let mut plan = ColumnPlan::new();
    for column in destination.iter() {
        if source.contains(column) && !is_synthesized(column) {
            plan.push(column, SourceExpr::Column(column.to_string()));
        }
    }

    for (column, literal) in synthesized {
        if destination.contains(column) {
            plan.push(column.as_str(), SourceExpr::Literal(*literal));
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::default_synthesized_columns;

    fn set(cols: &[&str]) -> ColumnSet {
        cols.iter().copied().collect()
    }

    fn literal_pairs(plan: &ColumnPlan, column: &str) -> usize {
        plan.entries()
            .iter()
            .filter(|e| e.destination == column && matches!(e.expr, SourceExpr::Literal(_)))
            .count()
    }

    #[test]
    fn test_orders_example() {
        let plan = reconcile(
            &set(&["id", "amount"]),
            &set(&["id", "amount", "archived_at"]),
            &default_synthesized_columns(),
        );

        let entries = plan.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].destination, "id");
        assert_eq!(entries[0].expr, SourceExpr::Column("id".to_string()));
        assert_eq!(entries[1].destination, "amount");
        assert_eq!(entries[1].expr, SourceExpr::Column("amount".to_string()));
        assert_eq!(entries[2].destination, "archived_at");
        assert_eq!(
            entries[2].expr,
            SourceExpr::Literal(TimeLiteral::CurrentTimestamp)
        );
    }

    #[test]
    fn test_plan_is_subset_of_intersection_without_synthesized() {
        let cases: &[(&[&str], &[&str])] = &[
            (&["a", "b", "c"], &["b", "c", "d"]),
            (&["a"], &["b"]),
            (&[], &["a", "b"]),
            (&["x", "y"], &[]),
            (&["id", "ID", "Id"], &["id", "Id"]),
            (&["archived_at", "id"], &["id", "archived_at"]),
        ];

        for (source_cols, dest_cols) in cases {
            let source = set(source_cols);
            let dest = set(dest_cols);
            let plan = reconcile(&source, &dest, &[]);
            for entry in plan.entries() {
                assert!(dest.contains(&entry.destination), "{:?}", entry);
                assert!(source.contains(&entry.destination), "{:?}", entry);
                assert_eq!(entry.expr, SourceExpr::Column(entry.destination.clone()));
            }
        }
    }

    #[test]
    fn test_archived_at_exactly_once_when_absent_from_source() {
        let plan = reconcile(
            &set(&["id"]),
            &set(&["id", "archived_at"]),
            &default_synthesized_columns(),
        );
        assert_eq!(literal_pairs(&plan, "archived_at"), 1);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_archived_at_exactly_once_when_present_in_source() {
        let plan = reconcile(
            &set(&["id", "archived_at"]),
            &set(&["archived_at", "id"]),
            &default_synthesized_columns(),
        );
        assert_eq!(literal_pairs(&plan, "archived_at"), 1);
        assert_eq!(
            plan.destination_columns().filter(|c| *c == "archived_at").count(),
            1
        );
        assert_eq!(
            plan.destination_columns().collect::<Vec<_>>(),
            vec!["id", "archived_at"]
        );
    }

    #[test]
    fn test_synthesized_ignored_when_destination_lacks_it() {
        let plan = reconcile(&set(&["id"]), &set(&["id"]), &default_synthesized_columns());
        assert_eq!(plan.destination_columns().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_empty_intersection_without_synthesized_match_is_empty() {
        let plan = reconcile(
            &set(&["a", "b"]),
            &set(&["c", "d"]),
            &default_synthesized_columns(),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_only_synthesized_column_applies() {
        let plan = reconcile(
            &set(&["a"]),
            &set(&["b", "archived_at"]),
            &default_synthesized_columns(),
        );
        assert_eq!(
            plan.destination_columns().collect::<Vec<_>>(),
            vec!["archived_at"]
        );
    }

    #[test]
    fn test_order_follows_destination_catalog() {
        let plan = reconcile(&set(&["c", "a", "b"]), &set(&["b", "c", "a"]), &[]);
        assert_eq!(
            plan.destination_columns().collect::<Vec<_>>(),
            vec!["b", "c", "a"]
        );
    }

    #[test]
    fn test_multiple_synthesized_keep_declaration_order() {
        let synthesized = vec![
            ("loaded_on".to_string(), TimeLiteral::CurrentDate),
            ("archived_at".to_string(), TimeLiteral::Now),
        ];
        let plan = reconcile(
            &set(&["id"]),
            &set(&["archived_at", "id", "loaded_on"]),
            &synthesized,
        );
        assert_eq!(
            plan.destination_columns().collect::<Vec<_>>(),
            vec!["id", "loaded_on", "archived_at"]
        );
    }

    #[test]
    fn test_case_sensitive_matching() {
        let plan = reconcile(&set(&["Amount"]), &set(&["amount"]), &[]);
        assert!(plan.is_empty());
    }
}
