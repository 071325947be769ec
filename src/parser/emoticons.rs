//! Skype emoticon catalog and shorthand-to-`<ss>` rewriting, transcribed
//! from `res/emoticons_to_py.py`'s `EMOTICONS` table (image resources
//! themselves are a GUI concern and are not carried over).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// `(name, title, shorthand strings)`, sorted by name to match the
/// original's `sorted(EMOTICONS.items())` iteration order.
pub const EMOTICON_DATA: &[(&str, &str, &[&str])] = &[
    ("angel", "Angel", &["(angel)"]),
    ("angry", "Angry", &[":@", ":-@", ":=@", "x(", "x-(", "x=(", "X(", "X-(", "X=("]),
    ("bandit", "Bandit", &["(bandit)"]),
    ("beer", "Beer", &["(beer)", "(b)", "(B)"]),
    ("bertlett", "(bartlett)", &["(bartlett)"]),
    ("blush", "Blush", &[":$", "(blush)", ":-$", ":=$"]),
    ("bow", "Bow", &["(bow)"]),
    ("brokenheart", "Broken heart", &["(u)", "(U)", "(brokenheart)"]),
    ("bug", "Bug", &["(bug)"]),
    ("cake", "Cake", &["(cake)", "(^)"]),
    ("call", "Call", &["(call)"]),
    ("cash", "Cash", &["(cash)", "(mo)", "($)"]),
    ("clap", "Clapping", &["(clap)"]),
    ("coffee", "Coffee", &["(coffee)"]),
    ("cool", "Cool", &["8=)", "8-)", "B=)", "B-)", "(cool)"]),
    ("cry", "Crying", &[";(", ";-(", ";=("]),
    ("dance", "Dance", &["(dance)", "\\o/", "\\:D/", "\\:d/"]),
    ("devil", "Devil", &["(devil)"]),
    ("doh", "Doh!", &["(doh)"]),
    ("drink", "Drink", &["(d)", "(D)"]),
    ("drunk", "Drunk", &["(drunk)"]),
    ("dull", "Dull", &["|(", "|-(", "|=(", "|-()"]),
    ("eg", "Evil grin", &["]:)", ">:)", "(grin)"]),
    ("emo", "Emo", &["(emo)"]),
    ("envy", "Envy", &["(envy)"]),
    ("facepalm", "Facepalm", &["(facepalm)"]),
    ("finger", "Finger", &["(finger)"]),
    ("fingerscrossed", "Fingers crossed", &["(fingerscrossed)"]),
    ("flower", "Flower", &["(f)", "(F)"]),
    ("fubar", "Fubar", &["(fubar)"]),
    ("giggle", "Giggle", &["(chuckle)", "(giggle)"]),
    ("handshake", "Shaking Hands", &["(handshake)"]),
    ("happy", "Happy", &["(happy)"]),
    ("headbang", "Headbang", &["(headbang)", "(banghead)"]),
    ("heart", "Heart", &["(h)", "(H)", "(l)", "(L)"]),
    ("heidy", "Heidy", &["(heidy)"]),
    ("hi", "Hi", &["(hi)"]),
    ("highfive", "High five", &["(highfive)"]),
    ("hollest", "Hollest", &["(hollest)"]),
    ("hug", "Hug", &["(hug)", "(bear)"]),
    ("inlove", "In love", &["(inlove)"]),
    ("kiss", "Kiss", &[":*", ":=*", ":-*"]),
    ("lalala", "Lalala", &["(lalala)"]),
    ("laugh", "Laugh", &[":D", ":=D", ":-D", ":d", ":=d", ":-d"]),
    ("lipssealed", "My lips are sealed", &[":x", ":-x", ":X", ":-X", ":#", ":-#", ":=x", ":=X", ":=#"]),
    ("mail", "Mail", &["(e)", "(m)"]),
    ("makeup", "Make-up", &["(makeup)", "(kate)"]),
    ("mmm", "mmmmm..", &["(mm)"]),
    ("mooning", "Mooning", &["(mooning)"]),
    ("movie", "Movie", &["(~)", "(film)", "(movie)"]),
    ("muscle", "Muscle", &["(muscle)", "(flex)"]),
    ("music", "Music", &["(music)"]),
    ("nerdy", "Nerd", &["8-|", "B-|", "8|", "B|", "8=|", "B=|", "(nerd)"]),
    ("ninja", "Ninja", &["(ninja)"]),
    ("no", "No", &["(n)", "(N)"]),
    ("nod", "Nodding", &["(nod)"]),
    ("oliver", "(oliver)", &["(oliver)"]),
    ("party", "Party", &["(party)"]),
    ("phone", "Phone", &["(ph)", "(mp)"]),
    ("pizza", "Pizza", &["(pizza)", "(pi)"]),
    ("poolparty", "Poolparty", &["(poolparty)"]),
    ("puke", "Puking", &["(puke)", ":&", ":-&", ":=&"]),
    ("punch", "Punch", &["(punch)"]),
    ("rain", "Raining", &["(rain)", "(london)", "(st)"]),
    ("rock", "Rock", &["(rock)"]),
    ("rofl", "Rolling on the floor laughing", &["(rofl)"]),
    ("sad", "Sad", &[":(", ":=(", ":-("]),
    ("shake", "Shaking", &["(shake)"]),
    ("skype", "Skype", &["(skype)", "(ss)"]),
    ("sleepy", "Sleepy", &["|-)", "I-)", "I=)", "(snooze)"]),
    ("smile", "Smile", &[":)", ":=)", ":-)"]),
    ("smirk", "Smirking", &["(smirk)"]),
    ("smoke", "Smoking", &["(smoking)", "(smoke)", "(ci)"]),
    ("soccer", "(soccer)", &["(soccer)"]),
    ("speechless", "Speechless", &[":|", ":=|", ":-|"]),
    ("star", "Star", &["(*)"]),
    ("sun", "Sun", &["(sun)"]),
    ("surprised", "Surprised", &[":O", ":=o", ":-o", ":o", ":=O", ":-O"]),
    ("swear", "Swearing", &["(swear)"]),
    ("sweat", "Sweating", &["(sweat)", "(:|"]),
    ("talk", "Talking", &["(talk)"]),
    ("think", "Thinking", &["(think)", ":?", ":-?", ":=?"]),
    ("time", "Time", &["(time)"]),
    ("tmi", "Too much information", &["(tmi)"]),
    ("toivo", "Toivo", &["(toivo)"]),
    ("tongueout", "Tongue out", &[":P", ":=P", ":-P", ":p", ":=p", ":-p"]),
    ("tumbleweed", "Tumbleweed", &["(tumbleweed)"]),
    ("wait", "Wait", &["(wait)"]),
    ("waiting", "Waiting", &["(waiting)"]),
    ("wasntme", "It wasn't me!", &["(wasntme)"]),
    ("wfh", "Working from home", &["(wfh)"]),
    ("whew", "Relieved", &["(whew)"]),
    ("wink", "Wink", &["(wink)", ";)", ";-)", ";=)"]),
    ("wonder", "Wondering", &[":^)"]),
    ("worry", "Worried", &[":S", ":-S", ":=S", ":s", ":-s", ":=s"]),
    ("wtf", "What the...", &["(wtf)"]),
    ("yawn", "Yawn", &["(yawn)"]),
    ("yes", "Yes", &["(y)", "(Y)", "(ok)"]),
];

/// HTML entities that must not get swallowed by an emoticon match spanning
/// an entity boundary, mirroring `COMMON_ENTITIES`.
const COMMON_ENTITIES: &[&str] = &["&quot;", "&lt;", "&gt;", "&amp;", "&apos;", "&#39;"];

/// Characters every emoticon shorthand contains at least one of; a quick
/// pre-filter before running the full alternation regex, as `EMOTICON_CHARS_RGX`.
pub fn looks_like_emoticon(body: &str) -> bool {
    body.contains([':', '|', '(', ')', '/'])
}

fn strings_to_name() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut m = HashMap::new();
        for (name, _title, strings) in EMOTICON_DATA {
            for s in *strings {
                m.insert(*s, *name);
            }
        }
        m
    })
}

fn emoticon_regex() -> &'static Regex {
    static RGX: OnceLock<Regex> = OnceLock::new();
    RGX.get_or_init(|| {
        let mut alts: Vec<String> = EMOTICON_DATA
            .iter()
            .flat_map(|(_, _, strings)| strings.iter())
            .map(|s| regex::escape(s))
            .collect();
        // Longer shorthands first, so a prefix like ":)" doesn't win over ":-)".
        alts.sort_by_key(|s| std::cmp::Reverse(s.len()));
        Regex::new(&format!("({})", alts.join("|"))).expect("emoticon alternation compiles")
    })
}

/// Replaces raw emoticon shorthand in `body` with `<ss type="name">shorthand</ss>`,
/// gated the way `EMOTICON_REPL` is: the match must be followed by optional
/// punctuation and then whitespace/end-of-string/another emoticon, and must
/// not straddle one of `COMMON_ENTITIES`.
pub fn replace_emoticons(body: &str) -> String {
    let rgx = emoticon_regex();
    let names = strings_to_name();
    let mut out = String::with_capacity(body.len());
    let mut last_end = 0;

    for m in rgx.find_iter(body) {
        out.push_str(&body[last_end..m.start()]);
        let matched = m.as_str();
        let Some(name) = names.get(matched) else {
            out.push_str(matched);
            last_end = m.end();
            continue;
        };

        let lookahead_ok = {
            let rest = &body[m.end()..];
            let after_punct = rest.trim_start_matches(|c: char| ".,;:?!'\"".contains(c));
            after_punct.is_empty() || after_punct.starts_with(char::is_whitespace)
        };
        let straddles_entity = {
            let ctx_start = m.start().saturating_sub(8);
            let ctx_end = (m.end() + 8).min(body.len());
            let ctx = &body[ctx_start..ctx_end];
            COMMON_ENTITIES.iter().any(|e| ctx.contains(e))
        };

        if lookahead_ok && !straddles_entity {
            out.push_str(&format!(r#"<ss type="{name}">{matched}</ss>"#));
        } else {
            out.push_str(matched);
        }
        last_end = m.end();
    }
    out.push_str(&body[last_end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_standalone_smiley() {
        let out = replace_emoticons("hi :) there");
        assert_eq!(out, r#"hi <ss type="smile">:)</ss> there"#);
    }

    #[test]
    fn leaves_non_emoticon_parens_alone() {
        let out = replace_emoticons("(not an emoticon at all really)");
        assert!(!out.contains("<ss"));
    }

    #[test]
    fn longer_shorthand_wins_over_prefix() {
        let out = replace_emoticons("test :-) end");
        assert!(out.contains(r#"type="smile">:-)"#));
    }
}
