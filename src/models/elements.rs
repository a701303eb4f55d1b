//! # 元素原子质量表
//!
//! 计算质量加权位移 Q 时使用的标准原子量 (amu)。
//!
//! ## 数据来源
//! IUPAC 2017 标准原子量（取常规值）
//!
//! ## 依赖关系
//! - 被 `models/structure.rs` 调用
//! - 纯静态数据，无外部依赖

use std::collections::HashMap;
use std::sync::LazyLock;

/// 原子质量数据库 (amu)
pub static ATOMIC_MASSES: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(|| {
    HashMap::from([
        ("H", 1.008), ("He", 4.002602), ("Li", 6.94), ("Be", 9.0121831),
        ("B", 10.81), ("C", 12.011), ("N", 14.007), ("O", 15.999),
        ("F", 18.998403163), ("Ne", 20.1797), ("Na", 22.98976928), ("Mg", 24.305),
        ("Al", 26.9815385), ("Si", 28.085), ("P", 30.973761998), ("S", 32.06),
        ("Cl", 35.45), ("Ar", 39.948), ("K", 39.0983), ("Ca", 40.078),
        ("Sc", 44.955908), ("Ti", 47.867), ("V", 50.9415), ("Cr", 51.9961),
        ("Mn", 54.938044), ("Fe", 55.845), ("Co", 58.933194), ("Ni", 58.6934),
        ("Cu", 63.546), ("Zn", 65.38), ("Ga", 69.723), ("Ge", 72.630),
        ("As", 74.921595), ("Se", 78.971), ("Br", 79.904), ("Kr", 83.798),
        ("Rb", 85.4678), ("Sr", 87.62), ("Y", 88.90584), ("Zr", 91.224),
        ("Nb", 92.90637), ("Mo", 95.95), ("Tc", 98.0), ("Ru", 101.07),
        ("Rh", 102.90550), ("Pd", 106.42), ("Ag", 107.8682), ("Cd", 112.414),
        ("In", 114.818), ("Sn", 118.710), ("Sb", 121.760), ("Te", 127.60),
        ("I", 126.90447), ("Xe", 131.293), ("Cs", 132.90545196), ("Ba", 137.327),
        ("La", 138.90547), ("Ce", 140.116), ("Pr", 140.90766), ("Nd", 144.242),
        ("Pm", 145.0), ("Sm", 150.36), ("Eu", 151.964), ("Gd", 157.25),
        ("Tb", 158.92535), ("Dy", 162.500), ("Ho", 164.93033), ("Er", 167.259),
        ("Tm", 168.93422), ("Yb", 173.045), ("Lu", 174.9668), ("Hf", 178.49),
        ("Ta", 180.94788), ("W", 183.84), ("Re", 186.207), ("Os", 190.23),
        ("Ir", 192.217), ("Pt", 195.084), ("Au", 196.966569), ("Hg", 200.592),
        ("Tl", 204.38), ("Pb", 207.2), ("Bi", 208.98040),
    ])
});

/// 获取元素的原子质量
///
/// 支持带编号的标签（如 "Fe1"、"O_2"），会去掉非字母后缀再查找。
pub fn atomic_mass(element: &str) -> Option<f64> {
    if let Some(&mass) = ATOMIC_MASSES.get(element) {
        return Some(mass);
    }

    let symbol: String = element
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .take(2)
        .collect();
    if let Some(&mass) = ATOMIC_MASSES.get(symbol.as_str()) {
        return Some(mass);
    }

    let first: String = symbol.chars().take(1).collect();
    ATOMIC_MASSES.get(first.as_str()).copied()
}
