use serde::Deserialize;
use std::collections::HashMap;
use std::hash::Hash;
use tally_core::{normalize_company, ReconciledRecord, RecordSet, TypedRecord, Value};

/// Column names the join operates on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct JoinColumns {
    /// Order identifier on the System A side; also the name of the joined key.
    pub key: String,
    /// System B identifier copied into `key` before joining.
    pub b_key_source: String,
    /// System B company column, normalised before joining.
    pub company: String,
}

impl Default for JoinColumns {
    fn default() -> Self {
        Self {
            key: "roid".to_string(),
            b_key_source: "aiorderid".to_string(),
            company: "company".to_string(),
        }
    }
}

/// Positions of joined records in the two inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinIndex {
    /// `(a, b)` index pairs in A order, then B order within one A record.
    pub pairs: Vec<(usize, usize)>,
    /// A records whose key has no counterpart in B.
    pub a_unmatched: Vec<usize>,
}

/// Relational inner join of `a` and `b` on `key`. Every B record sharing an
/// A record's key produces one pair. Records without a key never match.
pub fn inner_join_by<K, F>(a: &[TypedRecord], b: &[TypedRecord], key: F) -> JoinIndex
where
    K: Eq + Hash,
    F: Fn(&TypedRecord) -> Option<K>,
{
    let mut groups: HashMap<K, Vec<usize>> = HashMap::new();
    for (j, rec) in b.iter().enumerate() {
        if let Some(k) = key(rec) {
            groups.entry(k).or_default().push(j);
        }
    }

    let mut index = JoinIndex::default();
    for (i, rec) in a.iter().enumerate() {
        match key(rec).and_then(|k| groups.get(&k)) {
            Some(matches) => index.pairs.extend(matches.iter().map(|&j| (i, j))),
            None => index.a_unmatched.push(i),
        }
    }
    index
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Layout of every matched record, without the rebate columns.
    pub columns: Vec<String>,
    pub matched: Vec<ReconciledRecord>,
    pub a_unmatched: RecordSet,
}

pub struct Reconciler {
    columns: JoinColumns,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(JoinColumns::default())
    }
}

impl Reconciler {
    pub fn new(columns: JoinColumns) -> Self {
        Self { columns }
    }

    pub fn reconcile(&self, a: RecordSet, mut b: RecordSet) -> Reconciliation {
        let key = self.columns.key.as_str();

        b.alias_column(&self.columns.b_key_source, key);
        normalize_companies(&mut b, &self.columns.company);

        let index = inner_join_by(&a.records, &b.records, |r| r.get(key).cloned());
        let layout = MergeLayout::new(&a.columns, &b.columns, key);

        let matched = index
            .pairs
            .iter()
            .map(|&(i, j)| ReconciledRecord::new(layout.merge(&a.records[i], &b.records[j])))
            .collect::<Vec<_>>();

        let unmatched = index
            .a_unmatched
            .iter()
            .map(|&i| a.records[i].clone())
            .collect();

        tracing::info!(
            a_records = a.len(),
            b_records = b.len(),
            matched = matched.len(),
            a_unmatched = index.a_unmatched.len(),
            "reconciled on {key}"
        );

        Reconciliation {
            columns: layout.columns(),
            matched,
            a_unmatched: RecordSet::new(a.columns, unmatched),
        }
    }
}

fn normalize_companies(set: &mut RecordSet, column: &str) {
    for record in &mut set.records {
        if let Some(Value::Text(name)) = record.get(column) {
            let normalized = normalize_company(name);
            record.set(column, Value::Text(normalized));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    A,
    B,
}

/// Output column → (input side, input column). Non-key columns present on
/// both sides are suffixed `_x` (A) and `_y` (B).
struct MergeLayout {
    fields: Vec<(String, Side, String)>,
}

impl MergeLayout {
    fn new(a_columns: &[String], b_columns: &[String], key: &str) -> Self {
        let mut fields = Vec::with_capacity(a_columns.len() + b_columns.len());
        for col in a_columns {
            let name = if col != key && b_columns.contains(col) {
                format!("{col}_x")
            } else {
                col.clone()
            };
            fields.push((name, Side::A, col.clone()));
        }
        for col in b_columns.iter().filter(|c| *c != key) {
            let name = if a_columns.contains(col) {
                format!("{col}_y")
            } else {
                col.clone()
            };
            fields.push((name, Side::B, col.clone()));
        }
        Self { fields }
    }

    fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _, _)| name.clone()).collect()
    }

    fn merge(&self, a: &TypedRecord, b: &TypedRecord) -> TypedRecord {
        TypedRecord::from_fields(
            self.fields
                .iter()
                .filter_map(|(name, side, source)| {
                    let record = match side {
                        Side::A => a,
                        Side::B => b,
                    };
                    record.get(source).map(|v| (name.clone(), v.clone()))
                })
                .collect(),
        )
    }
}
