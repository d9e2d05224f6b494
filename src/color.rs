use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.70, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Group colours: group name → Color32
// ---------------------------------------------------------------------------

/// Assigns every group a distinct colour; channels that belong to no group
/// are drawn grey.
#[derive(Debug, Clone, Default)]
pub struct GroupColors {
    mapping: BTreeMap<String, Color32>,
}

impl GroupColors {
    pub fn new(groups: &[String]) -> Self {
        let mapping = groups
            .iter()
            .cloned()
            .zip(generate_palette(groups.len()))
            .collect();
        GroupColors { mapping }
    }

    pub fn color_for(&self, group: &str) -> Color32 {
        self.mapping.get(group).copied().unwrap_or(Color32::GRAY)
    }

    /// Colour of a channel: that of the first group whose name it contains.
    pub fn color_for_column(&self, column: &str) -> Color32 {
        self.mapping
            .iter()
            .find(|(g, _)| column.contains(g.as_str()))
            .map(|(_, c)| *c)
            .unwrap_or(Color32::GRAY)
    }

    /// Legend entries (group → colour) for the UI.
    pub fn legend_entries(&self) -> impl Iterator<Item = (&str, Color32)> + '_ {
        self.mapping.iter().map(|(g, c)| (g.as_str(), *c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_distinct() {
        let palette = generate_palette(4);
        assert_eq!(palette.len(), 4);
        for (i, a) in palette.iter().enumerate() {
            for b in &palette[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_column_colors() {
        let colors = GroupColors::new(&["Hela".to_string(), "Lung".to_string()]);
        assert_eq!(
            colors.color_for_column("Abundance: 126, Hela"),
            colors.color_for("Hela")
        );
        assert_eq!(colors.color_for_column("Abundance: 131, Blank"), Color32::GRAY);
    }
}
