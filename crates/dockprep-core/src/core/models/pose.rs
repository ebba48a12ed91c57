use serde::Serialize;

/// Number of anchor atom pairs stored in every pose block.
pub const ANCHOR_PAIRS: usize = 4;

/// An anchor's x, y and z coordinates as they appear in the archive.
pub type AnchorCoords = [String; 3];

/// The receptor/ligand anchor coordinates of one docked compound.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseBlock {
    pub shard: u32,
    pub pose_cluster: u32,
    pub name: String,
    /// Total score rounded to two decimals.
    pub total: f64,
    pub receptor_anchors: [AnchorCoords; ANCHOR_PAIRS],
    pub ligand_anchors: [AnchorCoords; ANCHOR_PAIRS],
}

impl PoseBlock {
    /// Explodes the block into one row per anchor pair.
    pub fn hit_rows(&self) -> Vec<HitRow> {
        self.receptor_anchors
            .iter()
            .zip(&self.ligand_anchors)
            .map(|([rec_x, rec_y, rec_z], [lig_x, lig_y, lig_z])| HitRow {
                sub_idx: self.shard,
                cls_idx: self.pose_cluster,
                mol_name: self.name.clone(),
                total: self.total,
                rec_x: rec_x.clone(),
                rec_y: rec_y.clone(),
                rec_z: rec_z.clone(),
                lig_x: lig_x.clone(),
                lig_y: lig_y.clone(),
                lig_z: lig_z.clone(),
            })
            .collect()
    }
}

/// One row of the hit coordinate table. Coordinates keep their archive text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRow {
    pub sub_idx: u32,
    pub cls_idx: u32,
    pub mol_name: String,
    #[serde(rename = "Total")]
    pub total: f64,
    pub rec_x: String,
    pub rec_y: String,
    pub rec_z: String,
    pub lig_x: String,
    pub lig_y: String,
    pub lig_z: String,
}

/// Rounds a score to two decimals, half away from zero.
pub fn round_score(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(x: &str, y: &str, z: &str) -> AnchorCoords {
        [x.to_string(), y.to_string(), z.to_string()]
    }

    #[test]
    fn block_explodes_into_four_rows() {
        let block = PoseBlock {
            shard: 2,
            pose_cluster: 5,
            name: "ZINC42".to_string(),
            total: -30.12,
            receptor_anchors: [
                coords("1.000", "2.000", "3.000"),
                coords("4.000", "5.000", "6.000"),
                coords("7.000", "8.000", "9.000"),
                coords("10.000", "11.000", "12.000"),
            ],
            ligand_anchors: [
                coords("-1.000", "-2.000", "-3.000"),
                coords("-4.000", "-5.000", "-6.000"),
                coords("-7.000", "-8.000", "-9.000"),
                coords("-10.000", "-11.000", "-12.000"),
            ],
        };
        let rows = block.hit_rows();
        assert_eq!(rows.len(), ANCHOR_PAIRS);
        assert_eq!(rows[2].rec_x, "7.000");
        assert_eq!(rows[2].lig_z, "-9.000");
        assert!(rows.iter().all(|r| r.mol_name == "ZINC42" && r.cls_idx == 5));
    }

    #[test]
    fn scores_round_to_two_decimals() {
        assert_eq!(round_score(-23.456), -23.46);
        assert_eq!(round_score(-23.45), -23.45);
        assert_eq!(round_score(10.0), 10.0);
    }
}
