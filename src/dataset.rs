//! Loader for column-oriented binary graph datasets.
//!
//! A dataset directory holds a JSON descriptor with the node and link counts
//! and one set of little-endian fixed-width files per column. A column may be
//! split over several numbered files whose names come from a template with a
//! `${FILE_ID}` placeholder; the pieces are concatenated in file id order.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_DESCRIPTOR;
use crate::error::DatasetError;
use crate::graph::{check_node, EdgeListGraph, FeatureColumn, NodeId};

pub const FILE_ID: &str = "${FILE_ID}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    I32,
    F32,
    U8,
}

impl ColumnType {
    /// Element width in bytes.
    pub fn width(self) -> usize {
        match self {
            ColumnType::I32 | ColumnType::F32 => 4,
            ColumnType::U8 => 1,
        }
    }
}

/// Where one column lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFiles {
    pub template: String,
    pub file_count: usize,
    pub column_type: ColumnType,
}

impl ColumnFiles {
    pub fn new(template: impl Into<String>, file_count: usize, column_type: ColumnType) -> Self {
        ColumnFiles {
            template: template.into(),
            file_count,
            column_type,
        }
    }

    fn file_name(&self, file_id: usize) -> String {
        self.template.replace(FILE_ID, &file_id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFeatureFiles {
    pub name: String,
    pub files: ColumnFiles,
}

/// File layout of a dataset: the three connection columns plus any number
/// of per-node feature columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLayout {
    pub from: ColumnFiles,
    pub to: ColumnFiles,
    pub value: ColumnFiles,
    #[serde(default)]
    pub node_features: Vec<NodeFeatureFiles>,
}

impl Default for DatasetLayout {
    /// The Istanbul trading network layout.
    fn default() -> Self {
        let feature = |name: &str, column_type| NodeFeatureFiles {
            name: name.to_string(),
            files: ColumnFiles::new(format!("feature_{}_{}.bin", name, FILE_ID), 1, column_type),
        };
        DatasetLayout {
            from: ColumnFiles::new(format!("ein_from_{}.bin", FILE_ID), 2, ColumnType::I32),
            to: ColumnFiles::new(format!("ein_to_{}.bin", FILE_ID), 2, ColumnType::I32),
            value: ColumnFiles::new(format!("ein_value_{}.bin", FILE_ID), 1, ColumnType::U8),
            node_features: vec![
                feature("degree", ColumnType::I32),
                feature("centrality", ColumnType::F32),
                feature("number_of_trades", ColumnType::I32),
                feature("profits", ColumnType::F32),
                feature("profits_excess", ColumnType::F32),
                feature("volume", ColumnType::F32),
            ],
        }
    }
}

impl DatasetLayout {
    /// Connection columns only, without node features.
    pub fn connections_only(from: ColumnFiles, to: ColumnFiles, value: ColumnFiles) -> Self {
        DatasetLayout {
            from,
            to,
            value,
            node_features: vec![],
        }
    }

    /// Load a layout from YAML.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("failed to open layout {}", path.display()))?;
        let layout = serde_yaml::from_reader(file).with_context(|| format!("invalid layout {}", path.display()))?;
        Ok(layout)
    }
}

/// Element counts of a dataset; unknown descriptor fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub nodes: usize,
    pub links: usize,
}

pub struct DatasetLoader {
    root: PathBuf,
    descriptor: String,
    layout: DatasetLayout,
}

impl DatasetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DatasetLoader {
            root: root.into(),
            descriptor: DEFAULT_DESCRIPTOR.to_string(),
            layout: DatasetLayout::default(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    pub fn with_layout(mut self, layout: DatasetLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn read_descriptor(&self) -> Result<DatasetDescriptor, DatasetError> {
        let path = self.root.join(&self.descriptor);
        let file = File::open(&path).map_err(|source| DatasetError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_reader(file).map_err(|source| DatasetError::Descriptor { path, source })
    }

    /// Load the whole dataset into memory.
    pub fn load(&self) -> Result<EdgeListGraph<f64>, DatasetError> {
        let descriptor = self.read_descriptor()?;
        info!(
            "Loading dataset {} ({} nodes, {} links)",
            self.root.display(),
            descriptor.nodes,
            descriptor.links
        );

        let from = self.read_column("from", &self.layout.from, descriptor.links)?;
        let to = self.read_column("to", &self.layout.to, descriptor.links)?;
        let value = self.read_column("value", &self.layout.value, descriptor.links)?;

        let from = node_ids("from", &from, descriptor.nodes)?;
        let to = node_ids("to", &to, descriptor.nodes)?;
        let values = weights(&value);
        let mut graph = EdgeListGraph::from_columns(descriptor.nodes, from, to, values)?;

        for feature in &self.layout.node_features {
            let column = self.read_column(&feature.name, &feature.files, descriptor.nodes)?;
            graph.insert_node_feature(feature.name.clone(), column);
        }
        info!("Loaded {}", graph.describe());
        Ok(graph)
    }

    /// Read and concatenate all files of one column, which must hold exactly
    /// `expected` elements.
    fn read_column(&self, name: &str, files: &ColumnFiles, expected: usize) -> Result<FeatureColumn, DatasetError> {
        if !files.template.contains(FILE_ID) {
            return Err(DatasetError::Template(files.template.clone()));
        }
        let width = files.column_type.width();
        let mut column = match files.column_type {
            ColumnType::I32 => FeatureColumn::I32(Vec::with_capacity(expected)),
            ColumnType::F32 => FeatureColumn::F32(Vec::with_capacity(expected)),
            ColumnType::U8 => FeatureColumn::U8(Vec::with_capacity(expected)),
        };

        for file_id in 0..files.file_count {
            let path = self.root.join(files.file_name(file_id));
            let data = std::fs::read(&path).map_err(|source| DatasetError::Io {
                path: path.clone(),
                source,
            })?;
            if data.len() % width != 0 {
                return Err(DatasetError::Misaligned {
                    path,
                    bytes: data.len() as u64,
                    width,
                });
            }
            debug!("Read {} ({} bytes) into column '{}'", path.display(), data.len(), name);
            decode_into(&mut column, &data);
        }

        if column.len() != expected {
            return Err(DatasetError::SizeMismatch {
                column: name.to_string(),
                expected,
                found: column.len(),
            });
        }
        Ok(column)
    }
}

fn decode_into(column: &mut FeatureColumn, data: &[u8]) {
    match column {
        FeatureColumn::I32(values) => {
            let start = values.len();
            values.resize(start + data.len() / 4, 0);
            LittleEndian::read_i32_into(data, &mut values[start..]);
        }
        FeatureColumn::F32(values) => {
            let start = values.len();
            values.resize(start + data.len() / 4, 0.0);
            LittleEndian::read_f32_into(data, &mut values[start..]);
        }
        FeatureColumn::U8(values) => values.extend_from_slice(data),
    }
}

fn node_ids(name: &str, column: &FeatureColumn, node_count: usize) -> Result<Vec<NodeId>, DatasetError> {
    let ids = match column {
        FeatureColumn::I32(values) => values
            .iter()
            .map(|id| check_node(*id as i64, node_count))
            .collect::<Result<Vec<_>, _>>()?,
        FeatureColumn::U8(values) => values
            .iter()
            .map(|id| check_node(*id as i64, node_count))
            .collect::<Result<Vec<_>, _>>()?,
        FeatureColumn::F32(_) => {
            return Err(DatasetError::ColumnType {
                column: name.to_string(),
            })
        }
    };
    Ok(ids)
}

fn weights(column: &FeatureColumn) -> Vec<f64> {
    match column {
        FeatureColumn::I32(values) => values.iter().map(|v| *v as f64).collect(),
        FeatureColumn::F32(values) => values.iter().map(|v| *v as f64).collect(),
        FeatureColumn::U8(values) => values.iter().map(|v| *v as f64).collect(),
    }
}

#[cfg(test)]
mod test_dataset {
    use std::path::Path;

    use byteorder::{LittleEndian, WriteBytesExt};

    use crate::dataset::{ColumnFiles, ColumnType, DatasetLayout, DatasetLoader};
    use crate::error::{DatasetError, GraphError};
    use crate::graph::{FeatureColumn, GraphView};

    fn write_i32(path: &Path, values: &[i32]) {
        let mut data = vec![];
        for value in values {
            data.write_i32::<LittleEndian>(*value).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }

    fn write_f32(path: &Path, values: &[f32]) {
        let mut data = vec![];
        for value in values {
            data.write_f32::<LittleEndian>(*value).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }

    /// Four nodes, three links, split the way the default layout expects.
    fn write_istanbul(dir: &Path) {
        std::fs::write(dir.join("global_params.json"), r#"{"nodes": 4, "links": 3, "name": "toy"}"#).unwrap();
        write_i32(&dir.join("ein_from_0.bin"), &[0, 1]);
        write_i32(&dir.join("ein_from_1.bin"), &[2]);
        write_i32(&dir.join("ein_to_0.bin"), &[1]);
        write_i32(&dir.join("ein_to_1.bin"), &[2, 3]);
        std::fs::write(dir.join("ein_value_0.bin"), [1u8, 7, 255]).unwrap();
        for name in ["degree", "number_of_trades"] {
            write_i32(&dir.join(format!("feature_{}_0.bin", name)), &[1, 2, 2, 1]);
        }
        for name in ["centrality", "profits", "profits_excess", "volume"] {
            write_f32(&dir.join(format!("feature_{}_0.bin", name)), &[0.5, 1.5, 2.5, 3.5]);
        }
    }

    fn connections_layout() -> DatasetLayout {
        DatasetLayout::connections_only(
            ColumnFiles::new("src_${FILE_ID}.bin", 1, ColumnType::I32),
            ColumnFiles::new("dst_${FILE_ID}.bin", 1, ColumnType::I32),
            ColumnFiles::new("w_${FILE_ID}.bin", 1, ColumnType::F32),
        )
    }

    #[test]
    fn test_load_default_layout() {
        let dir = tempfile::tempdir().unwrap();
        write_istanbul(dir.path());

        let g = DatasetLoader::new(dir.path()).load().unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(
            g.connections().collect::<Vec<_>>(),
            vec![(0, 1, 1.0), (1, 2, 7.0), (2, 3, 255.0)]
        );
        assert_eq!(g.node_feature("degree"), Some(&FeatureColumn::I32(vec![1, 2, 2, 1])));
        assert_eq!(g.node_feature("volume"), Some(&FeatureColumn::F32(vec![0.5, 1.5, 2.5, 3.5])));
        assert_eq!(g.node_feature_names().count(), 6);
    }

    #[test]
    fn test_custom_layout_and_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sizes.json"), r#"{"nodes": 3, "links": 2}"#).unwrap();
        write_i32(&dir.path().join("src_0.bin"), &[0, 2]);
        write_i32(&dir.path().join("dst_0.bin"), &[1, 1]);
        write_f32(&dir.path().join("w_0.bin"), &[0.25, 4.0]);

        let g = DatasetLoader::new(dir.path())
            .with_descriptor("sizes.json")
            .with_layout(connections_layout())
            .load()
            .unwrap();
        assert_eq!(g.connections().collect::<Vec<_>>(), vec![(0, 1, 0.25), (2, 1, 4.0)]);
    }

    #[test]
    fn test_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_istanbul(dir.path());
        std::fs::write(dir.path().join("ein_value_0.bin"), [1u8, 7]).unwrap();

        let err = DatasetLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(
            err,
            DatasetError::SizeMismatch { ref column, expected: 3, found: 2 } if column == "value"
        ));
    }

    #[test]
    fn test_overflowing_column() {
        let dir = tempfile::tempdir().unwrap();
        write_istanbul(dir.path());
        write_f32(&dir.path().join("feature_volume_0.bin"), &[0.5, 1.5, 2.5, 3.5, 4.5]);

        let err = DatasetLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, DatasetError::SizeMismatch { expected: 4, found: 5, .. }));
    }

    #[test]
    fn test_node_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        write_istanbul(dir.path());
        write_i32(&dir.path().join("ein_to_1.bin"), &[2, 4]);

        let err = DatasetLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(
            err,
            DatasetError::Graph(GraphError::NodeOutOfRange { node: 4, node_count: 4 })
        ));
    }

    #[test]
    fn test_misaligned_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        write_istanbul(dir.path());
        std::fs::write(dir.path().join("ein_from_1.bin"), [0u8, 0, 0]).unwrap();
        let err = DatasetLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, DatasetError::Misaligned { bytes: 3, width: 4, .. }));

        std::fs::remove_file(dir.path().join("ein_from_1.bin")).unwrap();
        let err = DatasetLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn test_bad_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("global_params.json"), r#"{"nodes": -1, "links": 3}"#).unwrap();
        let err = DatasetLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, DatasetError::Descriptor { .. }));
    }

    #[test]
    fn test_float_id_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("global_params.json"), r#"{"nodes": 3, "links": 1}"#).unwrap();
        write_f32(&dir.path().join("src_0.bin"), &[0.0]);
        write_i32(&dir.path().join("dst_0.bin"), &[1]);
        write_f32(&dir.path().join("w_0.bin"), &[1.0]);
        let mut layout = connections_layout();
        layout.from.column_type = ColumnType::F32;

        let err = DatasetLoader::new(dir.path()).with_layout(layout).load().unwrap_err();
        assert!(matches!(err, DatasetError::ColumnType { ref column } if column == "from"));
    }

    #[test]
    fn test_template_without_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("global_params.json"), r#"{"nodes": 1, "links": 0}"#).unwrap();
        let mut layout = connections_layout();
        layout.from.template = "src.bin".to_string();
        let err = DatasetLoader::new(dir.path()).with_layout(layout).load().unwrap_err();
        assert!(matches!(err, DatasetError::Template(_)));
    }

    #[test]
    fn test_layout_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"from: {template: 'src_${FILE_ID}.bin', file_count: 1, column_type: i32}\n\
              to: {template: 'dst_${FILE_ID}.bin', file_count: 1, column_type: i32}\n\
              value: {template: 'w_${FILE_ID}.bin', file_count: 1, column_type: f32}\n",
        )
        .unwrap();
        assert_eq!(DatasetLayout::from_yaml_file(file.path()).unwrap(), connections_layout());
    }
}
