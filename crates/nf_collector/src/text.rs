//! Boilerplate removal for extracted article text.
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("Invalid bracket regex"));

static URL_OR_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:https?|ftp)://[^\s/$.?#].[^\s]*|[\w.-]+@[\w.-]+")
        .expect("Invalid url/email regex")
});

static BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b[가-힣a-zA-Z]{2,5}\s?(?:기자|특파원|인턴기자|논설위원|연구원|객원기자)\b",
        r"|[(<\[]?\s*(?:사진|자료|제공)\s*[:=]\s*[\w\s,]+[\]>)]?",
        r"|(?:저작권자|copyright|ⓒ|©)\s?\(?c\)?\s?[\w\s.]+",
        r"|무단\s?(?:전재|배포|재배포|복제)\s?금지",
        r"|AI\s?학습\s?및\s?활용\s?금지",
        r"|(?i:All\s?rights\s?reserved)",
        r"|\(끝\)",
        r"|[\w\s]+(?:뉴스|신문|일보|미디어|방송)$",
    ))
    .expect("Invalid boilerplate regex")
});

static SYMBOLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[=*#◇◆■▶▲▷▼▽◀◁▣◎→]").expect("Invalid symbol regex"));

static INLINE_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\r\x0C\x0B]+").expect("Invalid whitespace regex"));

static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Invalid blank line regex"));

/// Strips bylines, captions, copyright and redistribution notices, links,
/// bracketed asides and decorative symbols, then normalizes whitespace.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = text
        .replace("\\n", "\n")
        .replace("\\\"", "\"")
        .replace("\\'", "'");

    let text = BRACKETED.replace_all(&text, "");
    let text = URL_OR_EMAIL.replace_all(&text, "");
    let text = BOILERPLATE.replace_all(&text, "");
    let text = SYMBOLS.replace_all(&text, " ");
    let text = text
        .replace(['ㆍ', '·'], " ")
        .replace('…', "...");
    let text = INLINE_WHITESPACE.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");

    text.trim().nfc().collect()
}

/// Truncates `text` at the last occurrence of the first marker found.
pub fn cut_at_markers(text: &str, markers: &[String]) -> String {
    for marker in markers.iter().filter(|m| !m.is_empty()) {
        if let Some(index) = text.rfind(marker.as_str()) {
            return text[..index].trim_end().to_string();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::byline("홍길동 기자 정부가 예산안을 발표했다", "정부가 예산안을 발표했다")]
    #[case::bracket("정부가 (서울=연합뉴스) 예산안을 [속보] 발표했다", "정부가 예산안을 발표했다")]
    #[case::url("자세한 내용은 https://example.com/a?b=c 참고", "자세한 내용은 참고")]
    #[case::email("문의 reporter@news.example 바랍니다", "문의 바랍니다")]
    #[case::redistribution("예산안 발표 무단전재 금지", "예산안 발표")]
    #[case::ai_notice("예산안 발표 AI 학습 및 활용 금지", "예산안 발표")]
    #[case::rights("Budget passed. All rights reserved", "Budget passed.")]
    #[case::copyright_notice("예산안 발표 copyright c Yonhap", "예산안 발표")]
    #[case::copyright_prose(
        "The Copyright Office said the new rules take effect in March, officials confirmed on Monday.",
        "The Copyright Office said the new rules take effect in March, officials confirmed on Monday."
    )]
    #[case::copyright_law("Lawmakers debated the copyright law reform.", "Lawmakers debated the copyright law reform.")]
    #[case::circled_c_prose("ⓒ 표시 규정 개정안이 통과됐다", "ⓒ 표시 규정 개정안이 통과됐다")]
    #[case::symbols("■ 예산안 ▶ 발표", "예산안 발표")]
    #[case::middle_dot("한ㆍ미 정상회담", "한 미 정상회담")]
    #[case::ellipsis("그리고…", "그리고...")]
    #[case::escaped_newline("첫 줄\\n둘째 줄", "첫 줄\n둘째 줄")]
    fn cleans_boilerplate(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_text(input), expected);
    }

    #[test]
    fn collapses_blank_lines_and_spaces() {
        assert_eq!(clean_text("a  b\t c\n\n\n\nd"), "a b c\n\nd");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   \n "), "");
    }

    #[test]
    fn composes_hangul_jamo() {
        // decomposed 한 (U+1112 U+1161 U+11AB)
        assert_eq!(clean_text("\u{1112}\u{1161}\u{11AB}"), "한");
    }

    #[test]
    fn cuts_at_last_marker() {
        let markers = vec!["제보는".to_string()];
        assert_eq!(
            cut_at_markers("본문 내용입니다. 제보는 카톡으로", &markers),
            "본문 내용입니다."
        );
        assert_eq!(cut_at_markers("본문", &markers), "본문");
    }
}
