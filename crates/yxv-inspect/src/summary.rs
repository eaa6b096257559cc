//! JSON summary of a loaded model.

use serde_json::{Value, json};
use yxv::{GeometrySource, LoadObserver, LoadSession, Orientation, PcaObject};

/// Vertical field of view used for the suggested camera distance.
const FOVY_DEGREES: f32 = 45.0;

fn geometry(object: &PcaObject) -> Value {
    let Some(geometry) = object.geometry() else {
        return Value::Null;
    };
    json!({
        "encoding": match geometry.source() {
            GeometrySource::Ascii => "text",
            GeometrySource::Binary => "binary",
        },
        "vertices": geometry.positions.len(),
        "tex_coords": geometry.tex_coords.len(),
        "triangles": geometry.triangles.len(),
        "bounds": geometry.bounds().map(|(min, max)| [min.to_array(), max.to_array()]),
    })
}

fn transform(object: &PcaObject) -> Value {
    let transform = object.transform();
    let orientation = match &transform.orientation {
        Orientation::Euler(angles) => json!({ "euler": angles.to_array() }),
        Orientation::Matrix(matrix) => json!({ "matrix": matrix.transpose().to_cols_array_2d() }),
    };
    json!({
        "position": transform.position.to_array(),
        "scale": transform.scale.to_array(),
        "orientation": orientation,
    })
}

fn channels<O: LoadObserver>(session: &LoadSession<O>, object: &PcaObject) -> Vec<Value> {
    let packed = session.packed(object.id()).unwrap_or_default();
    object
        .basis_desc()
        .iter()
        .zip(object.lut_desc())
        .enumerate()
        .map(|(channel, (basis, lut))| {
            let atlases = packed.get(channel).map(|p| {
                json!({
                    "packed_basis": p.packed_basis,
                    "capacity": p.capacity,
                    "offset": p.offset,
                    "textures": p.atlases.iter().map(|a| [a.width, a.height]).collect::<Vec<_>>(),
                })
            });
            json!({
                "basis_size": [basis.width, basis.height],
                "max_basis": basis.max_basis,
                "loaded_basis": object.loaded_basis_count(channel),
                "effective_basis": object.effective_basis_count(channel),
                "lut_size": [lut.width, lut.height],
                "atlas": atlases,
            })
        })
        .collect()
}

/// Summarise every object, evaluating coefficients at each of `angles`
/// (degrees of rotation about the vertical axis).
pub fn summarize<O: LoadObserver>(
    session: &mut LoadSession<O>,
    file_len: usize,
    angles: &[f32],
) -> Value {
    let ids: Vec<u32> = session.parser().objects().keys().copied().collect();
    let mut objects = Vec::with_capacity(ids.len());
    for id in ids {
        let mut samples = Vec::with_capacity(angles.len());
        for &angle in angles {
            session.update_coefficients(id, angle.to_radians());
            if let Some(coefficients) = session.object(id).and_then(PcaObject::coefficients) {
                samples.push(json!({
                    "rotation": angle,
                    "lut_angle": yxv::lut_angle(angle.to_radians()),
                    "channels": coefficients.channels,
                }));
            }
        }

        let Some(object) = session.object(id) else {
            continue;
        };
        let (lut_min, lut_max) = object.lut_range().vertical();
        objects.push(json!({
            "id": id,
            "ready": session.is_ready(id),
            "channels": channels(session, object),
            "lut_range": [lut_min, lut_max],
            "static_texture": object.static_texture().map(|t| json!({
                "bytes": t.blob.len(),
                "size": [t.width_hint, t.height_hint],
            })),
            "geometry": geometry(object),
            "transform": transform(object),
            "max_height": object.max_height(),
            "camera_distance": object.camera_distance(FOVY_DEGREES),
            "coefficients": samples,
        }));
    }

    let parser = session.parser();
    json!({
        "bytes": file_len,
        "declared_length": parser.declared_length(),
        "declared_objects": parser.declared_object_count(),
        "version": parser.version(),
        "objects": objects,
    })
}
