//! 有界数学题型
//!
//! 只识别四种形态：两数相乘、两数相加、百分比、一次方程 `a·x + b = c`。
//! 兜底生成器用 `render` 出题，校验器用 `detect` + `evaluate` 重算答案。
//! 这里不是通用算术引擎：连续运算、小数、负系数一律视为不可识别。

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// 整数操作数：`1,200` 形式的千分位或普通数字串；小数部分一并吃掉，解析时再拒绝
const NUMBER: &str = r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)";
/// 数字边界：前面不能紧跟数字、小数点或逗号
const LEAD: &str = r"(?:^|[^\d.,])";
/// 数字边界：后面不能接数字，也不能接紧跟数字的小数点或逗号
const TRAIL: &str = r"(?:[^\d.,]|[.,]\D|[.,]$|$)";

static RE_LINEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i){LEAD}{NUMBER}\s*x\s*\+\s*{NUMBER}\s*=\s*{NUMBER}{TRAIL}"
    ))
    .expect("static regex")
});
static RE_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){LEAD}{NUMBER}\s*%\s*of\s*{NUMBER}{TRAIL}")).expect("static regex")
});
static RE_BINARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{NUMBER}\s*([×*xX+])\s*{NUMBER}")).expect("static regex")
});
static RE_NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[A-Za-z]\s*=\s*)?(-?\d{1,3}(?:,\d{3})+|-?\d+)(\.\d+)?\s*$")
        .expect("static regex")
});

/// 紧邻运算对象出现时说明是连续运算
const OPERATOR_CHARS: &[char] = &['×', '*', 'x', 'X', '+', '-', '−', '÷', '/', '^'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathForm {
    Product { a: i64, b: i64 },
    Sum { a: i64, b: i64 },
    PercentOf { percent: i64, base: i64 },
    /// `a·x + b = result`
    Linear { a: i64, b: i64, result: i64 },
}

impl MathForm {
    /// 精确整数结果；不能整除或溢出时返回 None
    pub fn evaluate(&self) -> Option<i64> {
        match *self {
            MathForm::Product { a, b } => a.checked_mul(b),
            MathForm::Sum { a, b } => a.checked_add(b),
            MathForm::PercentOf { percent, base } => {
                let scaled = percent.checked_mul(base)?;
                (scaled % 100 == 0).then_some(scaled / 100)
            }
            MathForm::Linear { a, b, result } => {
                if a == 0 {
                    return None;
                }
                let rhs = result.checked_sub(b)?;
                (rhs % a == 0).then_some(rhs / a)
            }
        }
    }

    /// 题干文本，`detect(render(f)) == Some(f)`
    pub fn render(&self) -> String {
        match *self {
            MathForm::Product { a, b } => format!("What is {} × {}?", a, b),
            MathForm::Sum { a, b } => format!("What is {} + {}?", a, b),
            MathForm::PercentOf { percent, base } => format!("What is {}% of {}?", percent, base),
            MathForm::Linear { a, b, result } => format!("Solve for x: {}x + {} = {}", a, b, result),
        }
    }

    /// 校验器只复核乘法与加法两种形态
    pub fn is_binary(&self) -> bool {
        matches!(self, MathForm::Product { .. } | MathForm::Sum { .. })
    }

    pub fn detect(stem: &str) -> Option<MathForm> {
        if let Some(caps) = RE_LINEAR.captures(stem) {
            return Some(MathForm::Linear {
                a: parse_operand(&caps[1])?,
                b: parse_operand(&caps[2])?,
                result: parse_operand(&caps[3])?,
            });
        }
        if let Some(caps) = RE_PERCENT.captures(stem) {
            return Some(MathForm::PercentOf {
                percent: parse_operand(&caps[1])?,
                base: parse_operand(&caps[2])?,
            });
        }
        Self::detect_binary(stem)
    }

    fn detect_binary(stem: &str) -> Option<MathForm> {
        let caps = RE_BINARY.captures(stem)?;
        let whole = caps.get(0)?;

        let before = stem[..whole.start()].trim_end();
        let after = stem[whole.end()..].trim_start();
        let chained_before = before.ends_with(OPERATOR_CHARS)
            || before.ends_with(|c: char| c.is_ascii_digit() || c == '.' || c == ',');
        let chained_after = after
            .strip_prefix(OPERATOR_CHARS)
            .map(|rest| rest.trim_start().starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(false);
        // 操作数被截断（如 `1,0000`）时宁可不识别
        let truncated_after = stem[whole.end()..].starts_with(|c: char| c.is_ascii_digit())
            || stem[whole.end()..]
                .strip_prefix(['.', ','])
                .map(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
                .unwrap_or(false);
        if chained_before || chained_after || truncated_after {
            return None;
        }

        // 小数操作数不在可复核范围内
        let a = parse_operand(&caps[1])?;
        let b = parse_operand(&caps[3])?;
        match &caps[2] {
            "+" => Some(MathForm::Sum { a, b }),
            _ => Some(MathForm::Product { a, b }),
        }
    }
}

impl fmt::Display for MathForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MathForm::Product { a, b } => write!(f, "{} × {}", a, b),
            MathForm::Sum { a, b } => write!(f, "{} + {}", a, b),
            MathForm::PercentOf { percent, base } => write!(f, "{}% of {}", percent, base),
            MathForm::Linear { a, b, result } => write!(f, "{}x + {} = {}", a, b, result),
        }
    }
}

/// 去掉千分位后按整数解析；带小数部分的操作数返回 None
fn parse_operand(text: &str) -> Option<i64> {
    text.replace(',', "").parse().ok()
}

/// 把选项文本解析为数值：接受 `42`、`-3`、`1,200`、`2.5`、`x = 3`
pub fn numeric_value(text: &str) -> Option<f64> {
    let caps = RE_NUMERIC.captures(text)?;
    let integer = caps[1].replace(',', "");
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    format!("{}{}", integer, fraction).parse().ok()
}

/// 数值与整数结果是否相等
pub fn matches_value(text: &str, expected: i64) -> bool {
    numeric_value(text)
        .map(|v| (v - expected as f64).abs() < 1e-9)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_binary_forms() {
        assert_eq!(
            MathForm::detect("What is 3 × 4?"),
            Some(MathForm::Product { a: 3, b: 4 })
        );
        assert_eq!(
            MathForm::detect("Compute 12 * 11"),
            Some(MathForm::Product { a: 12, b: 11 })
        );
        assert_eq!(
            MathForm::detect("What is 5 x 6?"),
            Some(MathForm::Product { a: 5, b: 6 })
        );
        assert_eq!(
            MathForm::detect("What is 17 + 25?"),
            Some(MathForm::Sum { a: 17, b: 25 })
        );
    }

    #[test]
    fn test_chains_and_decimals_are_not_detected() {
        assert_eq!(MathForm::detect("What is 2 + 3 × 4?"), None);
        assert_eq!(MathForm::detect("What is 10 - 2 + 3?"), None);
        assert_eq!(MathForm::detect("What is 2.5 × 4?"), None);
        assert_eq!(MathForm::detect("Name the capital of France"), None);
    }

    #[test]
    fn test_thousands_separators_stay_in_one_operand() {
        assert_eq!(
            MathForm::detect("What is 1,200 + 300?"),
            Some(MathForm::Sum { a: 1200, b: 300 })
        );
        assert_eq!(
            MathForm::detect("What is 12 × 1,000?"),
            Some(MathForm::Product { a: 12, b: 1000 })
        );
        assert_eq!(
            MathForm::detect("What is 15% of 1,200?"),
            Some(MathForm::PercentOf {
                percent: 15,
                base: 1200
            })
        );
        assert_eq!(
            MathForm::detect("Solve for x: 2x + 1,000 = 3,000."),
            Some(MathForm::Linear {
                a: 2,
                b: 1000,
                result: 3000
            })
        );
        // 分组不规范时无法确定操作数
        assert_eq!(MathForm::detect("What is 12 × 1,0000?"), None);
        assert_eq!(MathForm::detect("What is 1,2345 + 1?"), None);
    }

    #[test]
    fn test_detect_percent_and_linear() {
        assert_eq!(
            MathForm::detect("What is 25% of 80?"),
            Some(MathForm::PercentOf {
                percent: 25,
                base: 80
            })
        );
        assert_eq!(
            MathForm::detect("Solve for x: 3x + 6 = 21"),
            Some(MathForm::Linear {
                a: 3,
                b: 6,
                result: 21
            })
        );
    }

    #[test]
    fn test_render_then_detect_is_identity() {
        let forms = [
            MathForm::Product { a: 7, b: 8 },
            MathForm::Sum { a: 40, b: 2 },
            MathForm::PercentOf {
                percent: 75,
                base: 200,
            },
            MathForm::Linear {
                a: 4,
                b: 3,
                result: 27,
            },
        ];
        for form in forms {
            assert_eq!(MathForm::detect(&form.render()), Some(form));
        }
    }

    #[test]
    fn test_evaluate() {
        assert_eq!(MathForm::Product { a: 5, b: 6 }.evaluate(), Some(30));
        assert_eq!(
            MathForm::PercentOf {
                percent: 25,
                base: 80
            }
            .evaluate(),
            Some(20)
        );
        assert_eq!(
            MathForm::PercentOf {
                percent: 33,
                base: 10
            }
            .evaluate(),
            None
        );
        assert_eq!(
            MathForm::Linear {
                a: 3,
                b: 6,
                result: 21
            }
            .evaluate(),
            Some(5)
        );
        assert_eq!(
            MathForm::Linear {
                a: 4,
                b: 1,
                result: 10
            }
            .evaluate(),
            None
        );
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value("42"), Some(42.0));
        assert_eq!(numeric_value(" 1,200 "), Some(1200.0));
        assert_eq!(numeric_value("x = 3"), Some(3.0));
        assert_eq!(numeric_value("2.5"), Some(2.5));
        assert_eq!(numeric_value("Carbon dioxide"), None);
        assert_eq!(numeric_value("30 apples"), None);
        assert!(matches_value("30", 30));
        assert!(!matches_value("11", 30));
    }
}
