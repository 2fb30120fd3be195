use crate::*;
use indexmap::IndexMap;
use tallystick::plurality::DefaultPluralityTally;
use tallystick::RankedWinners;

/// How often one selection was chosen
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SelectionTotal {
    pub selection: String,
    pub count: u64,
}

/// The totals for one ballot item
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ColumnTotals {
    pub column: String,

    /// Number of non-blank selections counted
    pub num_votes: u64,

    /// Ordered highest to lowest, ties alphabetical
    pub totals: Vec<SelectionTotal>,

    pub winners: RankedWinners<String>,
}

// Items allowing several selections are stored as `<item>_2`, `<item>_3`, ... next to `<item>`.
fn base_column<'a>(key: &'a str, columns: &[String]) -> &'a str {
    if columns.iter().any(|c| c == key) {
        return key;
    }
    match key.rfind('_') {
        Some(pos)
            if pos > 0
                && pos + 1 < key.len()
                && key[pos + 1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            &key[..pos]
        }
        _ => key,
    }
}

/// Count the selections of every decrypted record.
///
/// `columns` lists the items of the ballot; keys not on it that carry a numeric `_N` suffix
/// are counted towards their base item.
pub fn tally_records(
    records: &[DecryptedRecord],
    columns: &[String],
) -> IndexMap<String, ColumnTotals> {
    let mut tallies: IndexMap<String, DefaultPluralityTally<String>> = IndexMap::new();
    let mut counts: IndexMap<String, u64> = IndexMap::new();

    for record in records {
        for (key, selection) in record.selections.iter() {
            let column = base_column(key, columns);
            tallies
                .entry(column.to_owned())
                .or_insert_with(|| DefaultPluralityTally::new(1))
                .add_ref(selection);
            *counts.entry(column.to_owned()).or_insert(0) += 1;
        }
    }

    let mut results = IndexMap::with_capacity(tallies.len());
    for (column, tally) in tallies.into_iter() {
        let mut totals: Vec<SelectionTotal> = tally
            .totals()
            .into_iter()
            .map(|(selection, count)| SelectionTotal { selection, count })
            .collect();
        totals.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.selection.cmp(&b.selection))
        });

        let num_votes = counts.get(&column).cloned().unwrap_or(0);
        results.insert(
            column.clone(),
            ColumnTotals {
                column,
                num_votes,
                totals,
                winners: tally.winners(),
            },
        );
    }

    results
}
