//! Point-cloud model files.
//!
//! Only ASCII PLY with per-vertex `x y z` and optional `red green blue` is
//! understood. That covers the files written by Save Model and the point
//! clouds produced by the scanner.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Write as _;
use std::fs;
use thiserror::Error;

/// Colored point cloud shown in the scanning scene
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<[f32; 3]>,
    /// One entry per point, or empty when the file had no colors
    pub colors: Vec<[u8; 3]>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty() && self.colors.len() == self.points.len()
    }
}

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Failed to read model {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write model {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed PLY at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Reads and writes models for the Load/Save Model actions
pub trait MeshCodec {
    fn load(&self, path: &Utf8Path) -> Result<PointCloud, MeshError>;
    fn save(&self, path: &Utf8Path, cloud: &PointCloud) -> Result<(), MeshError>;
}

/// ASCII PLY codec
#[derive(Debug, Clone, Copy, Default)]
pub struct PlyCodec;

impl PlyCodec {
    pub fn parse(contents: &str) -> Result<PointCloud, MeshError> {
        let mut lines = contents.lines().enumerate();

        match lines.next() {
            Some((_, magic)) if magic.trim() == "ply" => {}
            _ => return Err(MeshError::UnsupportedFormat("missing ply magic".to_string())),
        }

        let mut vertex_count: Option<usize> = None;
        let mut in_vertex_element = false;
        let mut properties: Vec<String> = Vec::new();

        for (index, line) in lines.by_ref() {
            let mut words = line.split_whitespace();
            match words.next() {
                Some("format") => {
                    if words.next() != Some("ascii") {
                        return Err(MeshError::UnsupportedFormat(line.trim().to_string()));
                    }
                }
                Some("element") => {
                    let name = words.next();
                    in_vertex_element = name == Some("vertex");
                    if in_vertex_element {
                        let count = words.next().and_then(|c| c.parse().ok()).ok_or_else(|| {
                            MeshError::Malformed {
                                line: index + 1,
                                reason: "vertex element without count".to_string(),
                            }
                        })?;
                        vertex_count = Some(count);
                    }
                }
                Some("property") if in_vertex_element => {
                    // property <type> <name>
                    if let Some(name) = words.nth(1) {
                        properties.push(name.to_string());
                    }
                }
                Some("end_header") => break,
                _ => {}
            }
        }

        let count = vertex_count.ok_or_else(|| MeshError::Malformed {
            line: 0,
            reason: "no vertex element".to_string(),
        })?;

        let position = |name: &str| properties.iter().position(|p| p == name);
        let (Some(x), Some(y), Some(z)) = (position("x"), position("y"), position("z")) else {
            return Err(MeshError::Malformed {
                line: 0,
                reason: "vertex element lacks x/y/z".to_string(),
            });
        };
        let color = match (position("red"), position("green"), position("blue")) {
            (Some(r), Some(g), Some(b)) => Some([r, g, b]),
            _ => None,
        };

        let mut cloud = PointCloud {
            points: Vec::with_capacity(count),
            colors: Vec::with_capacity(if color.is_some() { count } else { 0 }),
        };

        for (index, line) in lines.take(count) {
            let values: Vec<&str> = line.split_whitespace().collect();
            let malformed = |reason: String| MeshError::Malformed {
                line: index + 1,
                reason,
            };
            if values.len() < properties.len() {
                return Err(malformed(format!(
                    "expected {} values, found {}",
                    properties.len(),
                    values.len()
                )));
            }

            let float = |i: usize| {
                values[i]
                    .parse::<f32>()
                    .map_err(|e| malformed(format!("{:?}: {}", values[i], e)))
            };
            cloud.points.push([float(x)?, float(y)?, float(z)?]);

            if let Some([r, g, b]) = color {
                let byte = |i: usize| {
                    values[i]
                        .parse::<u8>()
                        .map_err(|e| malformed(format!("{:?}: {}", values[i], e)))
                };
                cloud.colors.push([byte(r)?, byte(g)?, byte(b)?]);
            }
        }

        if cloud.points.len() != count {
            return Err(MeshError::Malformed {
                line: 0,
                reason: format!("header declares {} vertices, found {}", count, cloud.points.len()),
            });
        }

        Ok(cloud)
    }

    pub fn render(cloud: &PointCloud) -> String {
        let with_colors = cloud.has_colors();
        let mut out = String::new();

        out.push_str("ply\nformat ascii 1.0\ncomment Generated by Horus\n");
        let _ = writeln!(out, "element vertex {}", cloud.points.len());
        out.push_str("property float x\nproperty float y\nproperty float z\n");
        if with_colors {
            out.push_str("property uchar red\nproperty uchar green\nproperty uchar blue\n");
        }
        out.push_str("end_header\n");

        for (i, [x, y, z]) in cloud.points.iter().enumerate() {
            let _ = write!(out, "{} {} {}", x, y, z);
            if with_colors {
                let [r, g, b] = cloud.colors[i];
                let _ = write!(out, " {} {} {}", r, g, b);
            }
            out.push('\n');
        }
        out
    }
}

impl MeshCodec for PlyCodec {
    fn load(&self, path: &Utf8Path) -> Result<PointCloud, MeshError> {
        let contents = fs::read_to_string(path).map_err(|source| MeshError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cloud = Self::parse(&contents)?;
        tracing::info!("Loaded {} points from {}", cloud.len(), path);
        Ok(cloud)
    }

    fn save(&self, path: &Utf8Path, cloud: &PointCloud) -> Result<(), MeshError> {
        fs::write(path, Self::render(cloud)).map_err(|source| MeshError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Saved {} points to {}", cloud.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COLORED: &str = "ply
format ascii 1.0
element vertex 2
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
end_header
0 0 0 255 0 0
1.5 -2 3 0 128 255
";

    #[test]
    fn test_parse_colored_cloud() {
        let cloud = PlyCodec::parse(COLORED).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points[1], [1.5, -2.0, 3.0]);
        assert_eq!(cloud.colors[1], [0, 128, 255]);
    }

    #[test]
    fn test_parse_without_colors() {
        let ply = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nend_header\n4 5 6\n";
        let cloud = PlyCodec::parse(ply).unwrap();
        assert_eq!(cloud.points, vec![[4.0, 5.0, 6.0]]);
        assert!(!cloud.has_colors());
    }

    #[test]
    fn test_binary_ply_rejected() {
        let ply = "ply\nformat binary_little_endian 1.0\nelement vertex 0\nend_header\n";
        assert!(matches!(
            PlyCodec::parse(ply),
            Err(MeshError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_truncated_body_rejected() {
        let truncated = COLORED.lines().take(11).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            PlyCodec::parse(&truncated),
            Err(MeshError::Malformed { .. })
        ));
    }

    #[test]
    fn test_save_then_load_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("model.ply")).unwrap();
        let cloud = PlyCodec::parse(COLORED).unwrap();

        PlyCodec.save(&path, &cloud).unwrap();
        let loaded = PlyCodec.load(&path).unwrap();

        assert_eq!(loaded, cloud);
    }

    #[test]
    fn test_load_missing_file() {
        let result = PlyCodec.load(Utf8Path::new("/nonexistent/model.ply"));
        assert!(matches!(result, Err(MeshError::Read { .. })));
    }
}
