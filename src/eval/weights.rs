//! Fitted evaluation weights
//!
//! Two linear models share the feature set: one fitted on opening positions,
//! one on middle/endgame positions. They are blended by a clamped linear
//! ramp over the move count so the evaluation stays continuous across the
//! phase transition instead of switching hard.

/// Move index at which the blend sits at 50/50
pub const OPENING_PIVOT: f64 = 19.0;
/// Moves over which the blend ramps from all-opening to all-later
pub const BLEND_RANGE: f64 = 6.0;

/// Weight of the opening table for a given move count, in [0, 1]
#[inline]
pub fn opening_blend(n_moves: u32) -> f64 {
    (0.5 + (OPENING_PIVOT - n_moves as f64) / BLEND_RANGE).clamp(0.0, 1.0)
}

/// Middle/endgame feature weights
pub const LATER_WEIGHTS: &[(&str, f64)] = &[
    ("open-tessera", 2.3262898143345128),
    ("pente-threat-4", 1.931325800410917),
    ("pente-threat-31", 1.8784987650724434),
    ("pente-threat-22", 1.8523783616966716),
    ("open-tria", 2.011500382249705),
    ("stretch-tria", 1.2755344862869074),
    ("open-pair", 0.22345192530294544),
    ("capture-threat", 0.6398978506156765),
    ("stretch-two", 0.5059533141586162),
    ("double-stretch-two", -0.031543175991969256),
    ("three-gap", 0.24993006362008163),
    ("pente-potential-1", 0.9194719017712562),
    ("pente-potential-2", 0.6465971171700069),
    ("captures", 1.1052105254360394),
    ("my-4-captures", 0.6546643885214608),
    ("opp-4-captures", -1.2085250785056305),
    ("can-block-trias", 0.7974538869236613),
    ("non-quiet-moves", 0.4299902733567633),
];
pub const LATER_BIAS: f64 = -0.4840183351512664;

/// Opening feature weights
pub const OPENING_WEIGHTS: &[(&str, f64)] = &[
    ("open-tessera", 0.16382045598699985),
    ("pente-threat-4", 1.933716988434214),
    ("pente-threat-31", 2.0971965396271077),
    ("pente-threat-22", 0.7370080072628162),
    ("open-tria", 2.424302972226337),
    ("stretch-tria", 0.764170473401372),
    ("open-pair", 0.19762723631647697),
    ("capture-threat", 0.828476815977951),
    ("stretch-two", 0.853840225607935),
    ("double-stretch-two", -0.03724614114367376),
    ("three-gap", 0.25846748129983693),
    ("pente-potential-1", 0.38810607910740064),
    ("pente-potential-2", 0.6442108365643338),
    ("captures", 1.8969433568078122),
    ("my-4-captures", 0.0),
    ("opp-4-captures", 0.0),
    ("can-block-trias", 0.7498924763524428),
    ("non-quiet-moves", 0.5038152105492621),
];
pub const OPENING_BIAS: f64 = -0.4309151058620979;

/// Weight for `key` in `table`, zero for unweighted features
#[inline]
pub fn weight_of(table: &[(&str, f64)], key: &str) -> f64 {
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, w)| *w)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_ramp() {
        assert_eq!(opening_blend(0), 1.0);
        assert_eq!(opening_blend(19), 0.5);
        assert_eq!(opening_blend(40), 0.0);
        assert!(opening_blend(20) < opening_blend(18));
    }

    #[test]
    fn test_tables_cover_same_features() {
        for (k, _) in LATER_WEIGHTS {
            assert!(
                OPENING_WEIGHTS.iter().any(|(ok, _)| ok == k),
                "missing opening weight for {}",
                k
            );
        }
        assert_eq!(LATER_WEIGHTS.len(), OPENING_WEIGHTS.len());
    }

    #[test]
    fn test_weight_lookup() {
        assert!(weight_of(LATER_WEIGHTS, "open-tria") > 0.0);
        assert_eq!(weight_of(LATER_WEIGHTS, "no-such-feature"), 0.0);
    }
}
