//! Default mission catalog installed by `admin_seed_missions`.

/// (mission_code, mission_name, content)
pub const DEFAULT_MISSIONS: &[(&str, &str, &str)] = &[
    ("M001", "インサイド", "ブロンズは10回。シルバーは25回。ゴールドは100回。"),
    ("M002", "アウトサイド", "ブロンズは10回。シルバーは25回。ゴールドは100回。"),
    ("M003", "普通", "ブロンズは50回。シルバーは100回。ゴールドは300回。"),
    ("M004", "ちょんちょん", "ブロンズは20回。シルバーは50回。ゴールドは300回。"),
    ("M005", "インアウト", "ブロンズは15回。シルバーは50回。ゴールドは100回。"),
    ("M006", "アウトアウト", "ブロンズは10回。シルバーは20回。ゴールドは50回。"),
    ("M007", "3タッチ(3m)", "ブロンズは5回。シルバーは10回。ゴールドは20回。"),
    ("M008", "もも", "ブロンズは10回。シルバーは25回。ゴールドは50回。"),
    ("M009", "足足頭(頭の回数)", "ブロンズは3回。シルバーは10回。ゴールドは20回。"),
    ("M010", "足足肩(肩の回数)", "ブロンズは3回。シルバーは10回。ゴールドは20回。"),
    ("M011", "頭のみ", "ブロンズは5回。シルバーは10回。ゴールドは50回。"),
    ("M012", "世界一周", "ブロンズは1周。シルバーは2周。ゴールドは3周。"),
    ("M013", "世界逆一周", "ブロンズは1周。シルバーは2周。ゴールドは3周。"),
    ("M014", "アジア一周", "ブロンズは1周。シルバーは2周。ゴールドは3周。"),
    ("M015", "走りリフティング", "ブロンズは25m。シルバーは50m。ゴールドは200m。"),
    ("M016", "そうまリフティング", "ブロンズは25m×1回。シルバーは25m×連続2回。ゴールドは25m×連続3回。"),
    ("M017", "苦手足", "ブロンズは10回。シルバーは50回。ゴールドは100回。"),
    ("M018", "苦手足アウト", "ブロンズは5回。シルバーは10回。ゴールドは30回。"),
    ("M019", "苦手足イン", "ブロンズは5回。シルバーは10回。ゴールドは30回。"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_codes_unique_and_ordered() {
        let codes: Vec<&str> = DEFAULT_MISSIONS.iter().map(|(code, _, _)| *code).collect();
        let unique: HashSet<&str> = codes.iter().copied().collect();
        assert_eq!(unique.len(), codes.len());

        for (i, code) in codes.iter().enumerate() {
            assert_eq!(*code, format!("M{:03}", i + 1));
        }
    }
}
