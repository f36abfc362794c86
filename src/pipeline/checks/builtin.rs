//! Default QC check set. Each factory captures the configured account
//! key so the produced flag tables line up with the enrichment join.

use std::collections::HashSet;

use super::{QcCheck, CHECK_COLUMN};
use crate::table::{Cell, Table};

const DETAIL_COLUMN: &str = "Detail";

/// The checks a run performs unless the caller injects its own list.
pub fn default_checks(account_key: &str) -> Vec<QcCheck> {
    vec![
        account_missing_from_cot(account_key),
        unique_account_count_mismatch(account_key),
        sold_before_purchase(account_key),
    ]
}

/// Roster accounts with no chain-of-title row at all. A history table
/// lacking the key column counts every account as missing.
pub fn account_missing_from_cot(account_key: &str) -> QcCheck {
    let key = account_key.to_string();
    QcCheck::new("account_missing_from_cot", move |roster, history| {
        let mut flags = Table::new(vec![key.as_str(), CHECK_COLUMN, DETAIL_COLUMN]);

        let history_keys: HashSet<String> = history
            .column_values(&key)
            .map(|cells| {
                cells
                    .iter()
                    .filter(|cell| !cell.is_null())
                    .map(|cell| cell.render())
                    .collect()
            })
            .unwrap_or_default();

        let mut seen: HashSet<String> = HashSet::new();
        if let Ok(roster_keys) = roster.column_values(&key) {
            for cell in roster_keys {
                if cell.is_null() {
                    continue;
                }
                let rendered = cell.render();
                if history_keys.contains(&rendered) || !seen.insert(rendered.clone()) {
                    continue;
                }
                let row = vec![
                    cell.clone(),
                    Cell::Text("account_missing_from_cot".to_string()),
                    Cell::Text("no chain-of-title rows for account".to_string()),
                ];
                flags.push_row(row).ok();
            }
        }
        flags
    })
}

/// Portfolio-level count reconciliation: distinct roster accounts vs
/// distinct history accounts. A mismatch produces a single flag with a
/// null account key, which the enrichment join leaves unenriched.
pub fn unique_account_count_mismatch(account_key: &str) -> QcCheck {
    let key = account_key.to_string();
    QcCheck::new("unique_account_count_mismatch", move |roster, history| {
        let mut flags = Table::new(vec![key.as_str(), CHECK_COLUMN, DETAIL_COLUMN]);

        let roster_count = distinct_count(roster, &key);
        let history_count = distinct_count(history, &key);
        if roster_count != history_count {
            let detail = format!(
                "roster has {roster_count} distinct accounts, history has {history_count}"
            );
            let row = vec![
                Cell::Null,
                Cell::Text("unique_account_count_mismatch".to_string()),
                Cell::Text(detail),
            ];
            flags.push_row(row).ok();
        }
        flags
    })
}

/// History rows whose sale precedes their purchase. Rows where either
/// date failed to normalize carry no signal and are left alone.
pub fn sold_before_purchase(account_key: &str) -> QcCheck {
    let key = account_key.to_string();
    QcCheck::new("sold_before_purchase", move |_roster, history| {
        let mut flags = Table::new(vec![
            key.as_str(),
            CHECK_COLUMN,
            "SoldDate",
            "PurchaseDate",
        ]);

        for row_no in 0..history.row_count() {
            let sold = match history.cell(row_no, "sold_date") {
                Some(Cell::Date(date)) => *date,
                _ => continue,
            };
            let purchased = match history.cell(row_no, "purchase_date") {
                Some(Cell::Date(date)) => *date,
                _ => continue,
            };
            if sold < purchased {
                let account = history
                    .cell(row_no, &key)
                    .cloned()
                    .unwrap_or(Cell::Null);
                let row = vec![
                    account,
                    Cell::Text("sold_before_purchase".to_string()),
                    Cell::Date(sold),
                    Cell::Date(purchased),
                ];
                flags.push_row(row).ok();
            }
        }
        flags
    })
}

fn distinct_count(table: &Table, column: &str) -> usize {
    table
        .column_values(column)
        .map(|cells| {
            cells
                .iter()
                .filter(|cell| !cell.is_null())
                .map(|cell| cell.render())
                .collect::<HashSet<String>>()
                .len()
        })
        .unwrap_or(0)
}
