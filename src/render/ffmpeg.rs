//! Compiles a [`Timeline`] into an ffmpeg invocation.

use std::path::Path;

use super::timeline::{Slide, Timeline};

pub const WIDTH: u32 = 1280;
pub const HEIGHT: u32 = 720;
pub const BACKGROUND: &str = "0x1e1b4b";

/// Escape text for a single-quoted drawtext value.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            // A quote cannot be escaped inside a quoted filter value.
            '\'' => escaped.push('\u{2019}'),
            '\\' => escaped.push_str("\\\\"),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\%"),
            '\n' | '\r' => escaped.push(' '),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Alpha expression for the slide's fade in, hold and fade out.
pub fn alpha_expr(slide: &Slide) -> String {
    let start = slide.start;
    let end = slide.end();
    let fade = slide.fade();
    format!(
        "if(lt(t,{start:.3}),0,if(lt(t,{fade_in:.3}),(t-{start:.3})/{fade:.3},\
         if(lt(t,{fade_out:.3}),1,if(lt(t,{end:.3}),({end:.3}-t)/{fade:.3},0))))",
        fade_in = start + fade,
        fade_out = end - fade,
    )
}

pub fn drawtext_filter(slide: &Slide) -> String {
    format!(
        "drawtext=text='{}':fontcolor=white:fontsize=56:x=(w-text_w)/2:y=(h-text_h)/2:\
         enable='between(t,{:.3},{:.3})':alpha='{}'",
        escape_text(&slide.text),
        slide.start,
        slide.end(),
        alpha_expr(slide),
    )
}

/// Arguments (without the program) rendering `timeline` to `output`.
///
/// Progress is written to stdout as `key=value` lines.
pub fn command_args(timeline: &Timeline, output: &Path) -> Vec<String> {
    let source = format!(
        "color=c={}:s={}x{}:d={:.3}",
        BACKGROUND, WIDTH, HEIGHT, timeline.total_seconds
    );
    let filters = if timeline.slides.is_empty() {
        "null".to_string()
    } else {
        timeline
            .slides
            .iter()
            .map(drawtext_filter)
            .collect::<Vec<_>>()
            .join(",")
    };

    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        source,
        "-vf".to_string(),
        filters,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_filter_metacharacters() {
        assert_eq!(
            escape_text("It's 100% done: yes\\no"),
            "It\u{2019}s 100\\% done\\: yes\\\\no"
        );
    }

    #[test]
    fn one_drawtext_per_slide() {
        let timeline = Timeline::new(2025, vec!["a".into(), "b".into()], 10.0);
        let args = command_args(&timeline, Path::new("/tmp/out.mp4"));

        let vf = &args[args.iter().position(|a| a == "-vf").unwrap() + 1];
        assert_eq!(vf.matches("drawtext=").count(), 2);
        assert!(vf.contains("between(t,5.000,10.000)"));
        assert!(args.contains(&"color=c=0x1e1b4b:s=1280x720:d=10.000".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
        assert!(args.windows(2).any(|w| w[0] == "-progress" && w[1] == "pipe:1"));
    }

    #[test]
    fn alpha_expression_uses_thirds() {
        let slide = Slide {
            text: "x".into(),
            start: 3.0,
            duration: 3.0,
        };
        assert_eq!(
            alpha_expr(&slide),
            "if(lt(t,3.000),0,if(lt(t,4.000),(t-3.000)/1.000,\
             if(lt(t,5.000),1,if(lt(t,6.000),(6.000-t)/1.000,0))))"
        );
    }
}
