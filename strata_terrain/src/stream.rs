// Binary terrain stream: export and import of a `TerrainGeometry`.
//
// Layout (every integer in the chosen byte order):
//
//   u32 length, u32 width, u32 height
//   u32 record_count
//   record_count x { u32 x, u32 y, u8 layer_count,
//                    (2 * layer_count - 1) x u16 boundary }
//
// Export always writes one record per cell in row-major order (y outer,
// x inner), empty cells included with `layer_count = 0` and no boundary
// values. Import trusts the embedded (x, y) of each record, so record order
// does not matter, and finishes by building the neighbor graph.
//
// The plain `export`/`import` pair uses native byte order, matching files
// already written by other producers of this format. `export_with` and
// `import_with` take an explicit `byteorder::ByteOrder` for exchange
// between machines.
//
// `span_measure` and `grid_size` are NOT in the stream. The importer must be
// given the same `TerrainScale` the exporter used.

use crate::config::TerrainScale;
use crate::error::Result;
use crate::geometry::{TerrainGeometry, span_count};
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;
use std::io::{Read, Write};

pub use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Maximum number of grid cells accepted on import or construction (16M).
/// Guards against unbounded allocation from a corrupt header.
pub const MAX_GRID_CELLS: u64 = 16 * 1024 * 1024;

impl TerrainGeometry {
    /// Write this terrain in native byte order.
    pub fn export<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.export_with::<NativeEndian, W>(writer)
    }

    /// Write this terrain in byte order `B`.
    pub fn export_with<B: ByteOrder, W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<B>(self.length())?;
        writer.write_u32::<B>(self.width())?;
        writer.write_u32::<B>(self.height())?;
        // Bounded by MAX_GRID_CELLS, so it fits.
        let record_count = self.length() * self.width();
        writer.write_u32::<B>(record_count)?;

        for y in 0..self.width() {
            for x in 0..self.length() {
                let column = self.column(x, y)?;
                writer.write_u32::<B>(x)?;
                writer.write_u32::<B>(y)?;
                writer.write_u8(column.layer_count())?;
                for &value in self.boundaries(column) {
                    writer.write_u16::<B>(value)?;
                }
            }
        }
        writer.flush()?;
        log::debug!(
            "exported {}x{} terrain ({record_count} records, {} layer slots)",
            self.length(),
            self.width(),
            self.layer_slot_count()
        );
        Ok(())
    }

    /// Read a native-byte-order terrain and build its neighbor graph.
    pub fn import<R: Read>(reader: &mut R, scale: TerrainScale) -> Result<Self> {
        Self::import_with::<NativeEndian, R>(reader, scale)
    }

    /// Read a terrain written in byte order `B` and build its neighbor graph.
    pub fn import_with<B: ByteOrder, R: Read>(reader: &mut R, scale: TerrainScale) -> Result<Self> {
        let length = reader.read_u32::<B>()?;
        let width = reader.read_u32::<B>()?;
        let height = reader.read_u32::<B>()?;
        let mut geometry = TerrainGeometry::new(length, width, height, scale)?;

        let record_count = reader.read_u32::<B>()?;
        let mut boundaries: SmallVec<[u16; 16]> = SmallVec::new();
        for _ in 0..record_count {
            let x = reader.read_u32::<B>()?;
            let y = reader.read_u32::<B>()?;
            let layer_count = reader.read_u8()?;
            boundaries.clear();
            for _ in 0..span_count(layer_count) {
                boundaries.push(reader.read_u16::<B>()?);
            }
            geometry.add_layers(x, y, layer_count, &boundaries)?;
        }
        log::debug!("imported {length}x{width} terrain from {record_count} records");

        geometry.build_neighbor_graph()?;
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerrainError;
    use crate::types::{Direction, LayerRelation};
    use std::io::Cursor;

    fn scale() -> TerrainScale {
        TerrainScale::new(1.0, 50.0)
    }

    /// A small irregular terrain: mixed layer counts and an empty cell.
    fn sample_terrain() -> TerrainGeometry {
        let mut geo = TerrainGeometry::new(3, 2, 9, scale()).unwrap();
        geo.add_layers(0, 0, 1, &[40]).unwrap();
        geo.add_layers(1, 0, 3, &[80, 100, 150, 190, 260]).unwrap();
        geo.add_layers(2, 0, 2, &[0, 100, 300]).unwrap();
        geo.add_layers(0, 1, 1, &[42]).unwrap();
        // (1, 1) stays empty.
        geo.add_layers(2, 1, 2, &[5, 6, 7]).unwrap();
        geo
    }

    fn assert_same_terrain(a: &TerrainGeometry, b: &TerrainGeometry) {
        assert_eq!(a.length(), b.length());
        assert_eq!(a.width(), b.width());
        assert_eq!(a.height(), b.height());
        for y in 0..a.width() {
            for x in 0..a.length() {
                let ca = a.column(x, y).unwrap();
                let cb = b.column(x, y).unwrap();
                assert_eq!(ca.layer_count(), cb.layer_count(), "cell ({x}, {y})");
                assert_eq!(a.boundaries(ca), b.boundaries(cb), "cell ({x}, {y})");
            }
        }
    }

    #[test]
    fn roundtrip_native_order() {
        let original = sample_terrain();
        let mut buf = Vec::new();
        original.export(&mut buf).unwrap();

        let restored = TerrainGeometry::import(&mut Cursor::new(&buf), scale()).unwrap();
        assert_same_terrain(&original, &restored);
        assert!(restored.is_graph_built());
    }

    #[test]
    fn roundtrip_explicit_order() {
        let original = sample_terrain();
        let mut buf = Vec::new();
        original.export_with::<BigEndian, _>(&mut buf).unwrap();
        let restored =
            TerrainGeometry::import_with::<BigEndian, _>(&mut Cursor::new(&buf), scale()).unwrap();
        assert_same_terrain(&original, &restored);
    }

    #[test]
    fn export_layout_is_exact() {
        let mut geo = TerrainGeometry::new(2, 1, 7, scale()).unwrap();
        geo.add_layers(0, 0, 2, &[1, 2, 3]).unwrap();
        let mut buf = Vec::new();
        geo.export_with::<LittleEndian, _>(&mut buf).unwrap();

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            2, 0, 0, 0,   1, 0, 0, 0,   7, 0, 0, 0,   // length, width, height
            2, 0, 0, 0,                               // record count
            0, 0, 0, 0,   0, 0, 0, 0,   2,            // (0, 0), 2 layers
            1, 0,   2, 0,   3, 0,                     // boundaries
            1, 0, 0, 0,   0, 0, 0, 0,   0,            // (1, 0), empty
        ];
        assert_eq!(buf, expected);
    }

    #[test]
    fn import_trusts_embedded_coordinates() {
        // Records written out of row-major order, one cell omitted.
        let mut buf = Vec::new();
        for v in [2u32, 2, 1, 2] {
            buf.write_u32::<LittleEndian>(v).unwrap();
        }
        for (x, y, value) in [(1u32, 1u32, 9u16), (0, 1, 8)] {
            buf.write_u32::<LittleEndian>(x).unwrap();
            buf.write_u32::<LittleEndian>(y).unwrap();
            buf.write_u8(1).unwrap();
            buf.write_u16::<LittleEndian>(value).unwrap();
        }

        let geo =
            TerrainGeometry::import_with::<LittleEndian, _>(&mut Cursor::new(&buf), scale())
                .unwrap();
        assert_eq!(geo.boundaries(geo.column(1, 1).unwrap()), &[9]);
        assert_eq!(geo.boundaries(geo.column(0, 1).unwrap()), &[8]);
        assert_eq!(geo.column(0, 0).unwrap().layer_count(), 0);
        assert_eq!(geo.column(1, 0).unwrap().layer_count(), 0);
    }

    #[test]
    fn import_rejects_out_of_range_record() {
        let mut buf = Vec::new();
        for v in [2u32, 2, 1, 1, 5, 0] {
            buf.write_u32::<LittleEndian>(v).unwrap();
        }
        buf.write_u8(1).unwrap();
        buf.write_u16::<LittleEndian>(3).unwrap();
        let err = TerrainGeometry::import_with::<LittleEndian, _>(&mut Cursor::new(&buf), scale())
            .unwrap_err();
        assert!(matches!(err, TerrainError::OutOfBounds { x: 5, y: 0, .. }));
    }

    #[test]
    fn import_truncated_stream_is_io_error() {
        let mut buf = Vec::new();
        sample_terrain().export(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        let err = TerrainGeometry::import(&mut Cursor::new(&buf), scale()).unwrap_err();
        match err {
            TerrainError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn import_rejects_huge_header() {
        let mut buf = Vec::new();
        for v in [u32::MAX, u32::MAX, 1, 0] {
            buf.write_u32::<LittleEndian>(v).unwrap();
        }
        let err = TerrainGeometry::import_with::<LittleEndian, _>(&mut Cursor::new(&buf), scale())
            .unwrap_err();
        assert!(matches!(err, TerrainError::GridTooLarge { .. }));
    }

    #[test]
    fn uniform_two_layer_terrain_survives_roundtrip() {
        let mut geo = TerrainGeometry::new(3, 3, 3, scale()).unwrap();
        for y in 0..3 {
            for x in 0..3 {
                geo.add_layers_world(x, y, 2, &[0.0, 100.0, 300.0]).unwrap();
            }
        }
        let mut buf = Vec::new();
        geo.export(&mut buf).unwrap();

        let restored = TerrainGeometry::import(&mut Cursor::new(&buf), scale()).unwrap();
        let centre = restored.column(1, 1).unwrap();
        assert_eq!(restored.layer_at(centre, 10.0), 0);
        assert_eq!(restored.ceiling(centre, 1), 300.0);
        for dir in Direction::ALL {
            assert_eq!(restored.relation_at(centre, 1, dir), LayerRelation::Same);
        }
    }
}
