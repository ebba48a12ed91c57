use std::cmp::Ordering;
use std::fmt;

/// Column names of a full score row, in output order.
pub const SCORE_COLUMNS: [&str; 23] = [
    "sub_idx", "cls_idx", "mol_idx", "mol_name", "flex_code", "matched", "nscored", "time",
    "hac", "setnum", "matnum", "rank", "cloud", "elect", "gist", "vdW", "psol", "asol",
    "inter", "rec_e", "rec_d", "r_hyd", "Total",
];

/// A numeric field of a docking report line.
///
/// Integer and decimal fields are kept apart so they are written back the way
/// they were read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreValue {
    Int(i64),
    Float(f64),
}

impl ScoreValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ScoreValue::Int(v) => v as f64,
            ScoreValue::Float(v) => v,
        }
    }
}

impl fmt::Display for ScoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ScoreValue::Int(v) => write!(f, "{}", v),
            ScoreValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            ScoreValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One scored pose from a shard's docking report.
#[derive(Debug, Clone, PartialEq)]
pub struct OutdockRecord {
    pub shard: u32,
    pub pose_cluster: u32,
    pub pose_index: i64,
    pub name: Option<String>,
    pub terms: Vec<ScoreValue>,
}

impl OutdockRecord {
    /// The total score, which is the last scoring term of the line.
    pub fn total(&self) -> Option<f64> {
        self.terms.last().map(ScoreValue::as_f64)
    }

    /// Orders records by ascending total score; records without a total sort last.
    pub fn cmp_by_total(&self, other: &Self) -> Ordering {
        match (self.total(), other.total()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Renders the record as table fields, optionally without the pose-cluster id.
    pub fn to_fields(&self, include_pose_cluster: bool) -> Vec<String> {
        let mut fields = Vec::with_capacity(self.terms.len() + 4);
        fields.push(self.shard.to_string());
        if include_pose_cluster {
            fields.push(self.pose_cluster.to_string());
        }
        fields.push(self.pose_index.to_string());
        fields.push(self.name.clone().unwrap_or_default());
        fields.extend(self.terms.iter().map(ToString::to_string));
        fields
    }
}
