//! 存储文件名编解码：时间戳前缀 + 原始文件名。

use chrono::{DateTime, Utc};

/// 时间戳前缀格式，例如 `2024-01-01T00-00-00-000Z`。
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// 前缀模板：`0` 表示任意 ASCII 数字，其余字符需逐字匹配。
const PREFIX_TEMPLATE: &[u8] = b"0000-00-00T00-00-00-000Z-";

/// 前缀长度（含末尾分隔符 `-`）。
pub const PREFIX_LEN: usize = PREFIX_TEMPLATE.len();

/// 根据上传时间与原始文件名生成存储文件名。
pub fn encode(original_name: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", now.format(TIMESTAMP_FORMAT), original_name)
}

/// 去除时间戳前缀，还原原始文件名；不匹配时原样返回。
pub fn decode(stored_name: &str) -> &str {
    if has_timestamp_prefix(stored_name) {
        &stored_name[PREFIX_LEN..]
    } else {
        stored_name
    }
}

/// 从存储文件名的前缀中解析上传时间。
pub fn parse_timestamp(stored_name: &str) -> Option<DateTime<Utc>> {
    if !has_timestamp_prefix(stored_name) {
        return None;
    }
    let p = &stored_name[..PREFIX_LEN];
    let rfc3339 = format!(
        "{}:{}:{}.{}Z",
        &p[..13],
        &p[14..16],
        &p[17..19],
        &p[20..23]
    );
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

/// 判断名称能否安全地作为存储目录下的单层文件名使用。
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn has_timestamp_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= PREFIX_LEN
        && PREFIX_TEMPLATE
            .iter()
            .zip(bytes)
            .all(|(expected, actual)| match expected {
                b'0' => actual.is_ascii_digit(),
                _ => expected == actual,
            })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn encode_uses_dashed_iso_prefix() {
        assert_eq!(
            encode("report.pdf", new_year()),
            "2024-01-01T00-00-00-000Z-report.pdf"
        );
    }

    #[test]
    fn encode_keeps_millisecond_precision() {
        let now = new_year() + chrono::Duration::milliseconds(7_042);
        assert_eq!(encode("a", now), "2024-01-01T00-00-07-042Z-a");
    }

    #[test]
    fn decode_recovers_original_name() {
        let now = Utc::now();
        for name in ["report.pdf", "notes", "with space.tar.gz", "日本語.txt", ""] {
            assert_eq!(decode(&encode(name, now)), name);
        }
    }

    #[test]
    fn decode_only_strips_one_prefix() {
        let inner = encode("x.bin", new_year());
        let outer = encode(&inner, new_year());
        assert_eq!(decode(&outer), inner);
    }

    #[test]
    fn decode_leaves_unprefixed_names_alone() {
        assert_eq!(decode("plain.txt"), "plain.txt");
        assert_eq!(decode("2024-01-01T00:00:00.000Z-x"), "2024-01-01T00:00:00.000Z-x");
        assert_eq!(decode("2024-01-01T00-00-00-00Z-x"), "2024-01-01T00-00-00-00Z-x");
        assert_eq!(decode("2024-01-01T00-00-00-000Z"), "2024-01-01T00-00-00-000Z");
    }

    #[test]
    fn parse_timestamp_round_trips_prefix() {
        let now = new_year() + chrono::Duration::milliseconds(123);
        assert_eq!(parse_timestamp(&encode("f", now)), Some(now));
        assert_eq!(parse_timestamp("plain.txt"), None);
        assert_eq!(parse_timestamp("2024-13-01T00-00-00-000Z-f"), None);
    }

    #[test]
    fn stored_names_sort_in_upload_order() {
        let earlier = encode("b", new_year());
        let later = encode("a", new_year() + chrono::Duration::milliseconds(1));
        assert!(earlier < later);
    }

    #[test]
    fn safe_name_rejects_separators_and_dots() {
        assert!(is_safe_name("report.pdf"));
        assert!(is_safe_name("..hidden"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("."));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name("../etc/passwd"));
        assert!(!is_safe_name("dir/file"));
        assert!(!is_safe_name("dir\\file"));
        assert!(!is_safe_name("nul\0byte"));
    }
}
