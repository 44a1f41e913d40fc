//! The resource descriptor: identifies a channel or layer uniquely, and
//! derives the `boss_key`/`lookup_key` strings the rest of the coordination
//! layer keys everything off of.
//!
//! Grounded on `examples/original_source/project/djangoresource.py`'s
//! `populate_collection`/`populate_coord_frame`/`populate_experiment`/
//! `populate_channel_or_layer`/`populate_boss_key`/`populate_lookup_key`, and
//! on spec.md §9's tagged-variant design note for `ChannelOrLayer`.

use serde::{Deserialize, Serialize};

use crate::key_codec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateFrame {
    pub name: String,
    pub description: String,
    pub x_start: i64,
    pub x_stop: i64,
    pub y_start: i64,
    pub y_stop: i64,
    pub z_start: i64,
    pub z_stop: i64,
    pub x_voxel_size: f64,
    pub y_voxel_size: f64,
    pub z_voxel_size: f64,
    pub voxel_unit: String,
    pub time_step: f64,
    pub time_step_unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    pub description: String,
    pub num_hierarchy_levels: u32,
    pub hierarchy_method: String,
    pub max_time_sample: u64,
}

/// Datatype of a channel or layer's voxels. Only the image/annotation
/// distinction matters to this crate (it gates `reserve_ids`); the concrete
/// numeric type is opaque here, per spec.md §1's "numeric cuboid content ...
/// treated as opaque bytes of known shape".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Datatype {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
}

/// A channel holds image data; a layer holds integer annotation labels and
/// references the channels it was segmented from. Tagged variant per
/// spec.md §9's "dynamic descriptor → tagged variant" design note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelOrLayer {
    Channel {
        name: String,
        description: String,
        datatype: Datatype,
    },
    Layer {
        name: String,
        description: String,
        datatype: Datatype,
        base_resolution: u32,
        parent_channels: Vec<String>,
    },
}

impl ChannelOrLayer {
    pub fn name(&self) -> &str {
        match self {
            ChannelOrLayer::Channel { name, .. } => name,
            ChannelOrLayer::Layer { name, .. } => name,
        }
    }

    pub fn is_channel(&self) -> bool {
        matches!(self, ChannelOrLayer::Channel { .. })
    }
}

/// Uniquely identifies one channel/layer, with derived `boss_key` and
/// `lookup_key` identifiers. `lookup_key` is the stable key used throughout
/// the state store; `boss_key` is the human-readable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub collection: Collection,
    pub coord_frame: CoordinateFrame,
    pub experiment: Experiment,
    pub channel_or_layer: ChannelOrLayer,
    /// Numeric ids backing `lookup_key`; stable across renames.
    pub collection_id: u64,
    pub experiment_id: u64,
    pub channel_id: u64,
}

impl ResourceDescriptor {
    /// Human-readable `collection&experiment&channel` name triple.
    pub fn boss_key(&self) -> String {
        key_codec::boss_key(
            &self.collection.name,
            &self.experiment.name,
            self.channel_or_layer.name(),
        )
    }

    /// Numeric `<coll_id>&<exp_id>&<chan_id>` id triple: the stable key used
    /// in every state-store key in this crate.
    pub fn lookup_key(&self) -> String {
        key_codec::lookup_key(self.collection_id, self.experiment_id, self.channel_id)
    }

    pub fn is_channel(&self) -> bool {
        self.channel_or_layer.is_channel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceDescriptor {
        ResourceDescriptor {
            collection: Collection {
                name: "coll".into(),
                description: String::new(),
            },
            coord_frame: CoordinateFrame {
                name: "cf".into(),
                description: String::new(),
                x_start: 0,
                x_stop: 1000,
                y_start: 0,
                y_stop: 1000,
                z_start: 0,
                z_stop: 100,
                x_voxel_size: 1.0,
                y_voxel_size: 1.0,
                z_voxel_size: 1.0,
                voxel_unit: "nanometers".into(),
                time_step: 0.0,
                time_step_unit: "seconds".into(),
            },
            experiment: Experiment {
                name: "exp".into(),
                description: String::new(),
                num_hierarchy_levels: 6,
                hierarchy_method: "isotropic".into(),
                max_time_sample: 0,
            },
            channel_or_layer: ChannelOrLayer::Channel {
                name: "chan".into(),
                description: String::new(),
                datatype: Datatype::Uint8,
            },
            collection_id: 1,
            experiment_id: 2,
            channel_id: 3,
        }
    }

    #[test]
    fn boss_key_is_name_triple() {
        assert_eq!(sample().boss_key(), "coll&exp&chan");
    }

    #[test]
    fn lookup_key_is_id_triple() {
        assert_eq!(sample().lookup_key(), "1&2&3");
    }

    #[test]
    fn layer_is_not_a_channel() {
        let mut r = sample();
        r.channel_or_layer = ChannelOrLayer::Layer {
            name: "lyr".into(),
            description: String::new(),
            datatype: Datatype::Uint64,
            base_resolution: 0,
            parent_channels: vec!["1&2&3".into()],
        };
        assert!(!r.is_channel());
    }
}
