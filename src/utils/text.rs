//! 日志用的文本工具
//!
//! 模型原始输出可能很长且含多字节字符，写日志前按字符截断并压成单行。

/// 按字符截断，超出时追加省略号；不会在 UTF-8 字符中间切断
pub fn safe_truncate(input: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }

    let mut iter = input.chars();
    let head: String = iter.by_ref().take(max_chars).collect();
    if iter.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// 单行预览：换行替换为 ` ⏎ ` 后再截断
pub fn log_preview(input: &str, max_chars: usize) -> String {
    let single_line = input.trim().replace("\r\n", "\n").replace('\n', " ⏎ ");
    safe_truncate(&single_line, max_chars)
}
