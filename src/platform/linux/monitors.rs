use crate::platform::Rect;
use std::process::Command;

pub(super) fn xrandr_monitors() -> Vec<Rect> {
    let out = match Command::new("xrandr").arg("--current").output() {
        Ok(o) if o.status.success() => o,
        _ => return Vec::new(),
    };

    String::from_utf8_lossy(&out.stdout)
        .lines()
        .filter_map(parse_xrandr_line)
        .collect()
}

/// Parses "<name> connected [primary] WxH+X+Y ..." lines.
fn parse_xrandr_line(line: &str) -> Option<Rect> {
    if !line.contains(" connected") {
        return None;
    }

    let geom = line
        .split_whitespace()
        .find(|s| s.contains('+') && s.contains('x'))?;
    let (res, offsets) = geom.split_once('+')?;
    let (w, h) = res.split_once('x')?;
    let (ox, oy) = offsets.split_once('+')?;

    Some(Rect::new(
        ox.parse().ok()?,
        oy.parse().ok()?,
        w.parse().ok()?,
        h.parse().ok()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connected_outputs_only() {
        let cases = [
            (
                "DP-1 connected primary 2560x1440+0+0 (normal left inverted) 597mm x 336mm",
                Some(Rect::new(0.0, 0.0, 2560.0, 1440.0)),
            ),
            (
                "HDMI-1 connected 1920x1080+2560+180 (normal left inverted) 527mm x 296mm",
                Some(Rect::new(2560.0, 180.0, 1920.0, 1080.0)),
            ),
            ("HDMI-2 disconnected (normal left inverted right x axis y axis)", None),
            ("DP-2 connected (normal left inverted right x axis y axis)", None),
            ("   1920x1080     60.00*+  50.00", None),
        ];
        for (line, expected) in cases {
            assert_eq!(parse_xrandr_line(line), expected, "line: {line}");
        }
    }
}
