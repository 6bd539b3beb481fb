//! Preset definitions: balanced, structural-leaning, semantic-leaning.
//!
//! A preset fixes the three decision-rule parameters of the selector. The
//! loader applies it to any of those parameters the config file leaves unset.

use super::schema::{PresetName, SelectorConfig};

// ---------------------------------------------------------------------------
// PresetDefinition
// ---------------------------------------------------------------------------

/// Describes a single preset's decision thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetDefinition {
    pub name: PresetName,
    pub description: &'static str,
    pub structural_threshold: f64,
    pub semantic_quality_floor: f64,
    pub hybrid_margin: f64,
}

// ---------------------------------------------------------------------------
// Preset constructors
// ---------------------------------------------------------------------------

/// Get the preset definition for a given name.
pub fn get_preset(name: &PresetName) -> PresetDefinition {
    match name {
        PresetName::Balanced => balanced_preset(),
        PresetName::StructuralLeaning => structural_leaning_preset(),
        PresetName::SemanticLeaning => semantic_leaning_preset(),
    }
}

pub fn balanced_preset() -> PresetDefinition {
    PresetDefinition {
        name: PresetName::Balanced,
        description: "Default thresholds; hybrid when the two fits are close",
        structural_threshold: 0.65,
        semantic_quality_floor: 0.6,
        hybrid_margin: 0.15,
    }
}

/// Codebases where most questions name identifiers.
pub fn structural_leaning_preset() -> PresetDefinition {
    PresetDefinition {
        name: PresetName::StructuralLeaning,
        description: "Prefer AST answers; semantic-only needs strong prose evidence",
        structural_threshold: 0.55,
        semantic_quality_floor: 0.7,
        hybrid_margin: 0.1,
    }
}

/// Documentation-heavy repositories.
pub fn semantic_leaning_preset() -> PresetDefinition {
    PresetDefinition {
        name: PresetName::SemanticLeaning,
        description: "Prefer embedding search; structural-only needs a clear code target",
        structural_threshold: 0.75,
        semantic_quality_floor: 0.5,
        hybrid_margin: 0.15,
    }
}

impl PresetDefinition {
    /// Overwrite the decision thresholds of `selector` with this preset's.
    pub fn apply(&self, selector: &mut SelectorConfig) {
        selector.structural_threshold = self.structural_threshold;
        selector.semantic_quality_floor = self.semantic_quality_floor;
        selector.hybrid_margin = self.hybrid_margin;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_matches_selector_defaults() {
        let p = balanced_preset();
        let d = SelectorConfig::default();
        assert_eq!(p.structural_threshold, d.structural_threshold);
        assert_eq!(p.semantic_quality_floor, d.semantic_quality_floor);
        assert_eq!(p.hybrid_margin, d.hybrid_margin);
    }

    #[test]
    fn get_preset_returns_named_definition() {
        for name in [
            PresetName::Balanced,
            PresetName::StructuralLeaning,
            PresetName::SemanticLeaning,
        ] {
            assert_eq!(get_preset(&name).name, name);
        }
    }

    #[test]
    fn leaning_presets_move_thresholds_in_opposite_directions() {
        let s = structural_leaning_preset();
        let m = semantic_leaning_preset();
        let b = balanced_preset();
        assert!(s.structural_threshold < b.structural_threshold);
        assert!(m.structural_threshold > b.structural_threshold);
        assert!(s.semantic_quality_floor > b.semantic_quality_floor);
        assert!(m.semantic_quality_floor < b.semantic_quality_floor);
    }

    #[test]
    fn apply_overwrites_thresholds_only() {
        let mut selector = SelectorConfig {
            fallback_enabled: false,
            ..SelectorConfig::default()
        };
        structural_leaning_preset().apply(&mut selector);
        assert_eq!(selector.structural_threshold, 0.55);
        assert_eq!(selector.semantic_quality_floor, 0.7);
        assert_eq!(selector.hybrid_margin, 0.1);
        assert!(!selector.fallback_enabled);
    }

    #[test]
    fn all_presets_within_unit_range() {
        for p in [balanced_preset(), structural_leaning_preset(), semantic_leaning_preset()] {
            for v in [p.structural_threshold, p.semantic_quality_floor, p.hybrid_margin] {
                assert!((0.0..=1.0).contains(&v), "{} out of range in {}", v, p.name);
            }
            assert!(!p.description.is_empty());
        }
    }
}
