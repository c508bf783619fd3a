use crate::types::{Labels, MetricFamily, ObservationValue};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn render_text(families: &[MetricFamily]) -> String {
    let mut output = String::new();

    for family in families {
        output.push_str(&format!("# HELP {} {}\n", family.name, escape_help(&family.help)));
        output.push_str(&format!(
            "# TYPE {} {}\n",
            family.name,
            family.kind.as_prometheus_type()
        ));

        for sample in &family.samples {
            output.push_str(&family.name);
            output.push_str(&label_block(&sample.labels));
            output.push(' ');
            output.push_str(&format_value(sample.value));
            output.push('\n');
        }
    }

    output
}

/// `{k="v",...}` in key order, or nothing for an unlabelled sample.
fn label_block(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let pairs: Vec<String> = labels
        .iter()
        .map(|(key, value)| format!("{key}=\"{}\"", escape_label_value(value)))
        .collect();
    format!("{{{}}}", pairs.join(","))
}

fn format_value(value: ObservationValue) -> String {
    match value {
        ObservationValue::Bool(flag) => u8::from(flag).to_string(),
        ObservationValue::Integer(count) => count.to_string(),
        ObservationValue::Float(number) if number.is_nan() => "NaN".to_string(),
        ObservationValue::Float(number) if number.is_infinite() => {
            if number > 0.0 { "+Inf" } else { "-Inf" }.to_string()
        }
        ObservationValue::Float(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
            format!("{number:.0}")
        }
        ObservationValue::Float(number) => number.to_string(),
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricKind, Sample};

    fn family(name: &str, kind: MetricKind, samples: Vec<Sample>) -> MetricFamily {
        MetricFamily {
            name: name.to_string(),
            help: format!("Help for {name}"),
            kind,
            samples,
        }
    }

    fn sample(labels: &[(&str, &str)], value: impl Into<ObservationValue>) -> Sample {
        Sample {
            labels: labels
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
            value: value.into(),
        }
    }

    #[test]
    fn renders_help_type_and_samples() {
        let families = vec![
            family(
                "qbittorrent_up",
                MetricKind::Gauge,
                vec![sample(&[("server", "nas:8080"), ("version", "v4.6.0")], true)],
            ),
            family(
                "qbittorrent_alltime_dl",
                MetricKind::Counter,
                vec![sample(&[("server", "nas:8080")], 50_000_u64)],
            ),
        ];

        let text = render_text(&families);

        assert_eq!(
            text,
            "# HELP qbittorrent_up Help for qbittorrent_up\n\
             # TYPE qbittorrent_up gauge\n\
             qbittorrent_up{server=\"nas:8080\",version=\"v4.6.0\"} 1\n\
             # HELP qbittorrent_alltime_dl Help for qbittorrent_alltime_dl\n\
             # TYPE qbittorrent_alltime_dl counter\n\
             qbittorrent_alltime_dl{server=\"nas:8080\"} 50000\n"
        );
    }

    #[test]
    fn large_integers_are_exact() {
        let families = vec![family(
            "bytes",
            MetricKind::Counter,
            vec![sample(&[], 18_014_398_509_481_985_u64)],
        )];

        assert!(render_text(&families).contains("\nbytes 18014398509481985\n"));
    }

    #[test]
    fn special_floats_use_prometheus_spelling() {
        assert_eq!(format_value(ObservationValue::Float(f64::NAN)), "NaN");
        assert_eq!(format_value(ObservationValue::Float(f64::INFINITY)), "+Inf");
        assert_eq!(format_value(ObservationValue::Float(f64::NEG_INFINITY)), "-Inf");
        assert_eq!(format_value(ObservationValue::Float(2.0)), "2");
        assert_eq!(format_value(ObservationValue::Float(0.25)), "0.25");
    }

    #[test]
    fn label_values_are_escaped() {
        let families = vec![family(
            "qbittorrent_torrent_size",
            MetricKind::Gauge,
            vec![sample(&[("name", "a \"quoted\"\\path\nnext")], 1_u64)],
        )];

        assert!(render_text(&families)
            .contains(r#"qbittorrent_torrent_size{name="a \"quoted\"\\path\nnext"} 1"#));
    }

    #[test]
    fn help_escapes_backslash_and_newline_only() {
        assert_eq!(escape_help("a\\b\n\"c\""), "a\\\\b\\n\"c\"");
    }

    #[test]
    fn unlabelled_samples_have_no_braces() {
        assert_eq!(label_block(&Labels::new()), "");
        let families = vec![family("plain", MetricKind::Gauge, vec![sample(&[], 3_u64)])];
        assert!(render_text(&families).ends_with("\nplain 3\n"));
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render_text(&[]), "");
    }
}
