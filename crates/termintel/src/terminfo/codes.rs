#![forbid(unsafe_code)]

//! Termcap code to terminfo name index.
//!
//! Registries address capabilities by two-byte termcap code, while compiled
//! terminfo entries key them by terminfo name. The pairs below cover every
//! predefined string capability that has a termcap code, in database order.

use crate::capability::CapCode;

/// Predefined string capabilities as `(termcap code, terminfo name)`.
pub static STRING_CAPS: &[(&str, &str)] = &[
    ("bt", "cbt"),
    ("bl", "bel"),
    ("cr", "cr"),
    ("cs", "csr"),
    ("ct", "tbc"),
    ("cl", "clear"),
    ("ce", "el"),
    ("cd", "ed"),
    ("ch", "hpa"),
    ("CC", "cmdch"),
    ("cm", "cup"),
    ("do", "cud1"),
    ("ho", "home"),
    ("vi", "civis"),
    ("le", "cub1"),
    ("CM", "mrcup"),
    ("ve", "cnorm"),
    ("nd", "cuf1"),
    ("ll", "ll"),
    ("up", "cuu1"),
    ("vs", "cvvis"),
    ("dc", "dch1"),
    ("dl", "dl1"),
    ("ds", "dsl"),
    ("hd", "hd"),
    ("as", "smacs"),
    ("mb", "blink"),
    ("md", "bold"),
    ("ti", "smcup"),
    ("dm", "smdc"),
    ("mh", "dim"),
    ("im", "smir"),
    ("mk", "invis"),
    ("mp", "prot"),
    ("mr", "rev"),
    ("so", "smso"),
    ("us", "smul"),
    ("ec", "ech"),
    ("ae", "rmacs"),
    ("me", "sgr0"),
    ("te", "rmcup"),
    ("ed", "rmdc"),
    ("ei", "rmir"),
    ("se", "rmso"),
    ("ue", "rmul"),
    ("vb", "flash"),
    ("ff", "ff"),
    ("fs", "fsl"),
    ("i1", "is1"),
    ("is", "is2"),
    ("i3", "is3"),
    ("if", "if"),
    ("ic", "ich1"),
    ("al", "il1"),
    ("ip", "ip"),
    ("kb", "kbs"),
    ("ka", "ktbc"),
    ("kC", "kclr"),
    ("kt", "kctab"),
    ("kD", "kdch1"),
    ("kL", "kdl1"),
    ("kd", "kcud1"),
    ("kM", "krmir"),
    ("kE", "kel"),
    ("kS", "ked"),
    ("k0", "kf0"),
    ("k1", "kf1"),
    ("k;", "kf10"),
    ("k2", "kf2"),
    ("k3", "kf3"),
    ("k4", "kf4"),
    ("k5", "kf5"),
    ("k6", "kf6"),
    ("k7", "kf7"),
    ("k8", "kf8"),
    ("k9", "kf9"),
    ("kh", "khome"),
    ("kI", "kich1"),
    ("kA", "kil1"),
    ("kl", "kcub1"),
    ("kH", "kll"),
    ("kN", "knp"),
    ("kP", "kpp"),
    ("kr", "kcuf1"),
    ("kF", "kind"),
    ("kR", "kri"),
    ("kT", "khts"),
    ("ku", "kcuu1"),
    ("ke", "rmkx"),
    ("ks", "smkx"),
    ("l0", "lf0"),
    ("l1", "lf1"),
    ("la", "lf10"),
    ("l2", "lf2"),
    ("l3", "lf3"),
    ("l4", "lf4"),
    ("l5", "lf5"),
    ("l6", "lf6"),
    ("l7", "lf7"),
    ("l8", "lf8"),
    ("l9", "lf9"),
    ("mo", "rmm"),
    ("mm", "smm"),
    ("nw", "nel"),
    ("pc", "pad"),
    ("DC", "dch"),
    ("DL", "dl"),
    ("DO", "cud"),
    ("IC", "ich"),
    ("SF", "indn"),
    ("AL", "il"),
    ("LE", "cub"),
    ("RI", "cuf"),
    ("SR", "rin"),
    ("UP", "cuu"),
    ("pk", "pfkey"),
    ("pl", "pfloc"),
    ("px", "pfx"),
    ("ps", "mc0"),
    ("pf", "mc4"),
    ("po", "mc5"),
    ("rp", "rep"),
    ("r1", "rs1"),
    ("r2", "rs2"),
    ("r3", "rs3"),
    ("rf", "rf"),
    ("rc", "rc"),
    ("cv", "vpa"),
    ("sc", "sc"),
    ("sf", "ind"),
    ("sr", "ri"),
    ("sa", "sgr"),
    ("st", "hts"),
    ("wi", "wind"),
    ("ta", "ht"),
    ("ts", "tsl"),
    ("uc", "uc"),
    ("hu", "hu"),
    ("iP", "iprog"),
    ("K1", "ka1"),
    ("K3", "ka3"),
    ("K2", "kb2"),
    ("K4", "kc1"),
    ("K5", "kc3"),
    ("pO", "mc5p"),
    ("rP", "rmp"),
    ("ac", "acsc"),
    ("pn", "pln"),
    ("kB", "kcbt"),
    ("SX", "smxon"),
    ("RX", "rmxon"),
    ("SA", "smam"),
    ("RA", "rmam"),
    ("XN", "xonc"),
    ("XF", "xoffc"),
    ("eA", "enacs"),
    ("LO", "smln"),
    ("LF", "rmln"),
    ("@1", "kbeg"),
    ("@2", "kcan"),
    ("@3", "kclo"),
    ("@4", "kcmd"),
    ("@5", "kcpy"),
    ("@6", "kcrt"),
    ("@7", "kend"),
    ("@8", "kent"),
    ("@9", "kext"),
    ("@0", "kfnd"),
    ("%1", "khlp"),
    ("%2", "kmrk"),
    ("%3", "kmsg"),
    ("%4", "kmov"),
    ("%5", "knxt"),
    ("%6", "kopn"),
    ("%7", "kopt"),
    ("%8", "kprv"),
    ("%9", "kprt"),
    ("%0", "krdo"),
    ("&1", "kref"),
    ("&2", "krfr"),
    ("&3", "krpl"),
    ("&4", "krst"),
    ("&5", "kres"),
    ("&6", "ksav"),
    ("&7", "kspd"),
    ("&8", "kund"),
    ("&9", "kBEG"),
    ("&0", "kCAN"),
    ("*1", "kCMD"),
    ("*2", "kCPY"),
    ("*3", "kCRT"),
    ("*4", "kDC"),
    ("*5", "kDL"),
    ("*6", "kslt"),
    ("*7", "kEND"),
    ("*8", "kEOL"),
    ("*9", "kEXT"),
    ("*0", "kFND"),
    ("#1", "kHLP"),
    ("#2", "kHOM"),
    ("#3", "kIC"),
    ("#4", "kLFT"),
    ("%a", "kMSG"),
    ("%b", "kMOV"),
    ("%c", "kNXT"),
    ("%d", "kOPT"),
    ("%e", "kPRV"),
    ("%f", "kPRT"),
    ("%g", "kRDO"),
    ("%h", "kRPL"),
    ("%i", "kRIT"),
    ("%j", "kRES"),
    ("%k", "kSAV"),
    ("%l", "kSPD"),
    ("%m", "kUND"),
    ("RF", "rfi"),
    ("F1", "kf11"),
    ("F2", "kf12"),
    ("F3", "kf13"),
    ("F4", "kf14"),
    ("F5", "kf15"),
    ("F6", "kf16"),
    ("F7", "kf17"),
    ("F8", "kf18"),
    ("F9", "kf19"),
    ("FA", "kf20"),
    ("FB", "kf21"),
    ("FC", "kf22"),
    ("FD", "kf23"),
    ("FE", "kf24"),
    ("FF", "kf25"),
    ("FG", "kf26"),
    ("FH", "kf27"),
    ("FI", "kf28"),
    ("FJ", "kf29"),
    ("FK", "kf30"),
    ("FL", "kf31"),
    ("FM", "kf32"),
    ("FN", "kf33"),
    ("FO", "kf34"),
    ("FP", "kf35"),
    ("FQ", "kf36"),
    ("FR", "kf37"),
    ("FS", "kf38"),
    ("FT", "kf39"),
    ("FU", "kf40"),
    ("FV", "kf41"),
    ("FW", "kf42"),
    ("FX", "kf43"),
    ("FY", "kf44"),
    ("FZ", "kf45"),
    ("Fa", "kf46"),
    ("Fb", "kf47"),
    ("Fc", "kf48"),
    ("Fd", "kf49"),
    ("Fe", "kf50"),
    ("Ff", "kf51"),
    ("Fg", "kf52"),
    ("Fh", "kf53"),
    ("Fi", "kf54"),
    ("Fj", "kf55"),
    ("Fk", "kf56"),
    ("Fl", "kf57"),
    ("Fm", "kf58"),
    ("Fn", "kf59"),
    ("Fo", "kf60"),
    ("Fp", "kf61"),
    ("Fq", "kf62"),
    ("Fr", "kf63"),
    ("cb", "el1"),
    ("MC", "mgc"),
    ("ML", "smgl"),
    ("MR", "smgr"),
    ("Lf", "fln"),
    ("SC", "sclk"),
    ("DK", "dclk"),
    ("RC", "rmclk"),
    ("CW", "cwin"),
    ("WG", "wingo"),
    ("HU", "hup"),
    ("DI", "dial"),
    ("QD", "qdial"),
    ("TO", "tone"),
    ("PU", "pulse"),
    ("fh", "hook"),
    ("PA", "pause"),
    ("WA", "wait"),
    ("u0", "u0"),
    ("u1", "u1"),
    ("u2", "u2"),
    ("u3", "u3"),
    ("u4", "u4"),
    ("u5", "u5"),
    ("u6", "u6"),
    ("u7", "u7"),
    ("u8", "u8"),
    ("u9", "u9"),
    ("op", "op"),
    ("oc", "oc"),
    ("Ic", "initc"),
    ("Ip", "initp"),
    ("sp", "scp"),
    ("Sf", "setf"),
    ("Sb", "setb"),
    ("ZA", "cpi"),
    ("ZB", "lpi"),
    ("ZC", "chr"),
    ("ZD", "cvr"),
    ("ZE", "defc"),
    ("ZF", "swidm"),
    ("ZG", "sdrfq"),
    ("ZH", "sitm"),
    ("ZI", "slm"),
    ("ZJ", "smicm"),
    ("ZK", "snlq"),
    ("ZL", "snrmq"),
    ("ZM", "sshm"),
    ("ZN", "ssubm"),
    ("ZO", "ssupm"),
    ("ZP", "sum"),
    ("ZQ", "rwidm"),
    ("ZR", "ritm"),
    ("ZS", "rlm"),
    ("ZT", "rmicm"),
    ("ZU", "rshm"),
    ("ZV", "rsubm"),
    ("ZW", "rsupm"),
    ("ZX", "rum"),
    ("ZY", "mhpa"),
    ("ZZ", "mcud1"),
    ("Za", "mcub1"),
    ("Zb", "mcuf1"),
    ("Zc", "mvpa"),
    ("Zd", "mcuu1"),
    ("Ze", "porder"),
    ("Zf", "mcud"),
    ("Zg", "mcub"),
    ("Zh", "mcuf"),
    ("Zi", "mcuu"),
    ("Zj", "scs"),
    ("Zk", "smgb"),
    ("Zl", "smgbp"),
    ("Zm", "smglp"),
    ("Zn", "smgrp"),
    ("Zo", "smgt"),
    ("Zp", "smgtp"),
    ("Zq", "sbim"),
    ("Zr", "scsd"),
    ("Zs", "rbim"),
    ("Zt", "rcsd"),
    ("Zu", "subcs"),
    ("Zv", "supcs"),
    ("Zw", "docr"),
    ("Zx", "zerom"),
    ("Zy", "csnm"),
    ("Km", "kmous"),
    ("Mi", "minfo"),
    ("RQ", "reqmp"),
    ("Gm", "getm"),
    ("AF", "setaf"),
    ("AB", "setab"),
];

/// Terminfo name of the string capability with termcap `code`.
#[must_use]
pub fn terminfo_name(code: CapCode) -> Option<&'static str> {
    let bytes = code.bytes();
    STRING_CAPS
        .iter()
        .find(|(termcap, _)| termcap.as_bytes() == bytes)
        .map(|(_, name)| *name)
}

/// Termcap code of the string capability with terminfo `name`.
#[must_use]
pub fn termcap_code(name: &str) -> Option<CapCode> {
    STRING_CAPS
        .iter()
        .find(|(_, terminfo)| *terminfo == name)
        .map(|(termcap, _)| CapCode::of(termcap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_pairs() {
        assert_eq!(terminfo_name(CapCode::of("cm")), Some("cup"));
        assert_eq!(terminfo_name(CapCode::of("ku")), Some("kcuu1"));
        assert_eq!(terminfo_name(CapCode::of("ks")), Some("smkx"));
        assert_eq!(terminfo_name(CapCode::of("u7")), Some("u7"));
        assert_eq!(terminfo_name(CapCode::of("AF")), Some("setaf"));
        assert_eq!(termcap_code("kf11"), Some(CapCode::of("F1")));
        assert_eq!(termcap_code("pad"), Some(CapCode::of("pc")));
    }

    #[test]
    fn margin_and_unknown_codes() {
        assert_eq!(terminfo_name(CapCode::of("ML")), Some("smgl"));
        assert_eq!(terminfo_name(CapCode::of("Zm")), Some("smglp"));
        assert_eq!(terminfo_name(CapCode::of("zz")), None);
        assert_eq!(termcap_code("no-such-cap"), None);
    }

    #[test]
    fn codes_and_names_are_unique() {
        for (i, (code, name)) in STRING_CAPS.iter().enumerate() {
            let code = CapCode::of(code);
            assert_eq!(STRING_CAPS.iter().position(|(c, _)| CapCode::of(c) == code), Some(i), "{name}");
            assert_eq!(termcap_code(name), Some(code), "{name}");
        }
    }
}
