//! Height map persistence for `G29`/`M374`/`M375`.

use crate::ControlError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const CSV_HEADER: &str = "gmux height map v1, generated by the control daemon";

/// A probed bed height grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeightMap {
    /// Grid start along X.
    pub x_min: f32,
    /// Grid spacing along X.
    pub x_spacing: f32,
    /// Grid start along Y.
    pub y_min: f32,
    /// Grid spacing along Y.
    pub y_spacing: f32,
    /// Number of points per row.
    pub num_x: usize,
    /// Z offsets, row by row (`num_x` entries per row).
    pub z: Vec<f32>,
}

impl HeightMap {
    /// Number of rows.
    #[must_use]
    pub fn num_y(&self) -> usize {
        if self.num_x == 0 {
            0
        } else {
            self.z.len() / self.num_x
        }
    }

    /// Renders the CSV form.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(CSV_HEADER);
        out.push('\n');
        out.push_str("xmin,xspacing,ymin,yspacing,xnum\n");
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            self.x_min, self.x_spacing, self.y_min, self.y_spacing, self.num_x
        ));
        for row in self.z.chunks(self.num_x.max(1)) {
            let line: Vec<String> = row.iter().map(|z| format!("{z:.3}")).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }

    /// Parses the CSV form.
    ///
    /// # Errors
    ///
    /// [`ControlError::Handler`] when the document is not a height map.
    pub fn from_csv(content: &str) -> Result<Self, ControlError> {
        let mut lines = content.lines();
        let header = lines.next().unwrap_or_default();
        if !header.starts_with("gmux height map") {
            return Err(ControlError::Handler("not a height map file".into()));
        }
        // Column label line.
        lines.next();

        let dims = lines
            .next()
            .ok_or_else(|| ControlError::Handler("height map is truncated".into()))?;
        let fields: Vec<&str> = dims.split(',').map(str::trim).collect();
        if fields.len() != 5 {
            return Err(ControlError::Handler("malformed height map header".into()));
        }
        let parse = |s: &str| {
            s.parse::<f32>()
                .map_err(|_| ControlError::Handler(format!("invalid height map value '{s}'")))
        };
        let mut map = Self {
            x_min: parse(fields[0])?,
            x_spacing: parse(fields[1])?,
            y_min: parse(fields[2])?,
            y_spacing: parse(fields[3])?,
            num_x: fields[4]
                .parse()
                .map_err(|_| ControlError::Handler("invalid grid size".into()))?,
            z: Vec::new(),
        };
        for line in lines {
            for cell in line.split(',') {
                map.z.push(parse(cell)?);
            }
        }
        Ok(map)
    }

    /// Writes the CSV form to a file.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures.
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_csv()).await
    }

    /// Loads the CSV form from a file.
    ///
    /// # Errors
    ///
    /// [`ControlError::Io`] for I/O failures, [`ControlError::Handler`]
    /// for malformed content.
    pub async fn load(path: &Path) -> Result<Self, ControlError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_csv(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HeightMap {
        HeightMap {
            x_min: 10.0,
            x_spacing: 20.0,
            y_min: 5.0,
            y_spacing: 20.0,
            num_x: 3,
            z: vec![0.01, -0.02, 0.0, 0.1, 0.2, -0.3],
        }
    }

    #[test]
    fn csv_round_trip() {
        let map = sample();
        let csv = map.to_csv();
        let back = HeightMap::from_csv(&csv).unwrap();
        assert_eq!(back.num_x, 3);
        assert_eq!(back.num_y(), 2);
        assert_eq!(back.z.len(), 6);
        assert!((back.z[5] - (-0.3)).abs() < 1e-3);
    }

    #[test]
    fn foreign_content_rejected() {
        assert!(HeightMap::from_csv("hello\nworld").is_err());
        assert!(HeightMap::from_csv("").is_err());
    }

    #[tokio::test]
    async fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sys/heightmap.csv");
        sample().save(&path).await.unwrap();
        let back = HeightMap::load(&path).await.unwrap();
        assert_eq!(back.num_x, sample().num_x);
    }
}
