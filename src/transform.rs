// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tiny_skia::Transform;

/// Parses a `Matrix` value: six comma-separated numbers.
///
/// `a,b,c,d,e,f` maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
///
/// Returns an identity transform when the value has any other number
/// of components or a component is not a number.
pub fn parse_matrix(text: &str) -> Transform {
    let mut values = [0.0f32; 6];
    let mut count = 0;
    for part in text.split(',') {
        if count == values.len() {
            log::warn!("Invalid matrix: '{}'.", text);
            return Transform::default();
        }

        match part.trim().parse::<f32>() {
            Ok(n) if n.is_finite() => values[count] = n,
            _ => {
                log::warn!("Invalid matrix: '{}'.", text);
                return Transform::default();
            }
        }

        count += 1;
    }

    if count != values.len() {
        log::warn!("Invalid matrix: '{}'.", text);
        return Transform::default();
    }

    let [a, b, c, d, e, f] = values;
    Transform::from_row(a, b, c, d, e, f)
}

/// Parses a transform attribute value, like `RenderTransform` or `Transform`.
///
/// Resource references (`{StaticResource ...}`) are not supported
/// and resolve to identity.
pub fn parse_matrix_ref(text: &str) -> Transform {
    if text.trim_start().starts_with('{') {
        log::warn!("Transform resources are not supported. '{}' is ignored.", text);
        return Transform::default();
    }

    parse_matrix(text)
}
