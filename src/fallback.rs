//! Offline answers for when no live model is reachable.
//!
//! Classification is a flat table of substring rules evaluated in order; the
//! first hit wins. Classification is deterministic and has no failure path.

use serde::Serialize;

pub const NOTE_LOCAL: &str = "using local fallback";
pub const NOTE_SAFETY: &str = "safety-first";

// Inputs shorter than this (in chars) are treated as too vague to classify
const MIN_QUESTION_CHARS: usize = 10;

const VAGUE_PHRASES: &[&str] = &["what is", "who is", "help", "tell me"];

const DANGER_WORDS: &[&str] = &["poison", "mix", "drink", "inject", "harmful", "toxic"];

const CLARIFY_ANSWER: &str = "Hi — I can help with pest prevention, identification, and treatment advice. Tell me what pest you have (rats, termites, cockroaches, mosquitoes, bedbugs, ants, fleas, flies), where you see them, and any photos or symptoms. I will then give step-by-step, safe guidance.";

const SAFETY_ANSWER: &str = "I cannot provide instructions that could be dangerous or harmful. For chemical or medical interventions, consult a licensed professional and follow product labels and local regulations.";

const DEFAULT_ANSWER: &str = "I can help with pest ID, prevention, and safe treatment. Tell me: which pest (or describe what you see), where it is (kitchen, bedroom, yard), and any photos or details. I will then provide step-by-step advice and indicate when to call a professional.";

struct Topic {
    keywords: &'static [&'static str],
    intro: &'static str,
    steps: &'static [&'static str],
    outro: Option<&'static str>,
}

impl Topic {
    fn answer(&self) -> String {
        let mut answer = String::from(self.intro);
        answer.push_str(&self.steps.join(" "));
        if let Some(outro) = self.outro {
            answer.push(' ');
            answer.push_str(outro);
        }
        answer
    }
}

// Order matters: earlier rows win on overlapping keywords
const TOPICS: &[Topic] = &[
    Topic {
        keywords: &["rodent", "rat", "rats", "mice", "mouse"],
        intro: "For rodents: ",
        steps: &[
            "Inspect: look for droppings, gnaw marks, and entry points around walls, pipes, and skirting.",
            "Sanitation: remove food sources (store food in sealed containers), clean crumbs/spills, secure pet food.",
            "Exclude: seal holes and gaps larger than 6mm using steel wool, metal mesh, or expanding foam on exterior and interior entry points.",
            "Trapping: use snap traps or secure indoor live traps; place alongside walls where droppings are found. Avoid poison inside homes where pets/children are present.",
            "Professional help: call professionals if infestation is large, if you suspect baiting is required outdoors, if you have health concerns, or if exclusion is difficult.",
        ],
        outro: Some(
            "If you want, tell me where you mainly see them (kitchen, roof, store-room) and I can give a tailored plan.",
        ),
    },
    Topic {
        keywords: &["termite", "termites", "woodworm"],
        intro: "Termite guidance: ",
        steps: &[
            "Check for mud tubes on foundations and soft or hollow-sounding timber.",
            "Reduce wood-to-soil contact and remove damp timber where possible.",
            "Avoid DIY insecticide drenches for large infestations — contact a licensed pest control company for inspection and a treatment plan (chemical or baiting).",
            "Prevent: improve drainage, ventilate crawl spaces, store firewood away from the house.",
        ],
        outro: None,
    },
    Topic {
        keywords: &["cockroach", "cockroaches", "roach"],
        intro: "Cockroach steps: ",
        steps: &[
            "Sanitation: remove crumbs, wash dishes promptly, keep bins sealed.",
            "Baiting: use gel baits in cracks and crevices, away from children/pets.",
            "Crack sealing: seal gaps behind appliances and around pipes.",
            "Call professionals if you see many cockroaches or if baits are ineffective.",
        ],
        outro: None,
    },
    Topic {
        keywords: &["mosquito", "mosquitoes", "aedes"],
        intro: "Mosquito prevention: ",
        steps: &[
            "Eliminate standing water (pots, drains, puddles) where mosquitoes breed.",
            "Use screens, bed nets, and repellents when necessary.",
            "Consider larvicidal treatment of persistent water sources if appropriate (professional advice recommended).",
        ],
        outro: None,
    },
    Topic {
        keywords: &["bed bug", "bed bugs", "bedbugs"],
        intro: "Bed bug advice: ",
        steps: &[
            "Confirm: look for blood spots on sheets and small brown insects in mattress seams.",
            "Contain: wash bedding in hot water, vacuum mattress seams, and use mattress encasements.",
            "Professional heat treatment or insecticide treatment is usually required for elimination.",
        ],
        outro: None,
    },
    Topic {
        keywords: &["ant", "ants"],
        intro: "Ant control: ",
        steps: &[
            "Identify entry trails and remove food sources.",
            "Use bait stations rather than sprays to target colonies.",
            "Seal entry points and keep surfaces clean.",
        ],
        outro: None,
    },
    Topic {
        keywords: &["flea", "fleas"],
        intro: "Flea control: ",
        steps: &[
            "Treat pets with vet-approved flea control, wash bedding, and vacuum carpets frequently.",
            "Consider insecticidal treatment for indoor heavy infestations and treat outdoor resting areas.",
        ],
        outro: None,
    },
    Topic {
        keywords: &["fly", "flies"],
        intro: "Fly control: ",
        steps: &[
            "Manage waste and keep bins sealed.",
            "Use screens and fly traps where appropriate.",
            "Remove breeding material such as exposed food or animal waste.",
        ],
        outro: None,
    },
];

/// Where the danger-keyword rule sits relative to the pest topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyOrder {
    /// Pest topics first; a message naming a pest never reaches the safety rule.
    #[default]
    AfterTopics,
    /// Danger keywords are checked before any pest topic.
    BeforeTopics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalReply {
    pub answer: String,
    pub note: &'static str,
}

impl LocalReply {
    fn local(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            note: NOTE_LOCAL,
        }
    }

    fn safety() -> Self {
        Self {
            answer: SAFETY_ANSWER.to_string(),
            note: NOTE_SAFETY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackResponder {
    safety_order: SafetyOrder,
}

impl FallbackResponder {
    pub fn new(safety_order: SafetyOrder) -> Self {
        Self { safety_order }
    }

    pub fn local_reply(&self, question: &str) -> LocalReply {
        let q = question.trim().to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| q.contains(w));

        if q.chars().count() < MIN_QUESTION_CHARS || has(VAGUE_PHRASES) {
            return LocalReply::local(CLARIFY_ANSWER);
        }

        if self.safety_order == SafetyOrder::BeforeTopics && has(DANGER_WORDS) {
            return LocalReply::safety();
        }

        if let Some(topic) = TOPICS.iter().find(|t| has(t.keywords)) {
            return LocalReply::local(topic.answer());
        }

        if has(DANGER_WORDS) {
            return LocalReply::safety();
        }

        LocalReply::local(DEFAULT_ANSWER)
    }
}

/// Classify with the default rule order.
pub fn local_reply(question: &str) -> LocalReply {
    FallbackResponder::default().local_reply(question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_input_asks_for_detail() {
        for q in ["", "hi", "   rats   ", "ants?"] {
            let reply = local_reply(q);
            assert_eq!(reply.answer, CLARIFY_ANSWER, "input {q:?}");
            assert_eq!(reply.note, NOTE_LOCAL);
        }
    }

    #[test]
    fn test_vague_phrases_win_over_topics() {
        let reply = local_reply("Can you help with the cockroaches in my flat?");
        assert_eq!(reply.answer, CLARIFY_ANSWER);

        let reply = local_reply("tell me about termites please");
        assert_eq!(reply.answer, CLARIFY_ANSWER);
    }

    #[test]
    fn test_rodents() {
        let reply = local_reply("I have rats in my kitchen");
        assert!(reply.answer.starts_with("For rodents: Inspect:"));
        assert!(reply.answer.contains("rodents"));
        assert!(reply.answer.ends_with("I can give a tailored plan."));
        assert_eq!(reply.note, NOTE_LOCAL);
    }

    #[test]
    fn test_topics_in_order() {
        let cases = [
            ("Woodworm holes in the stairs", "Termite guidance: "),
            ("Roaches come out at night", "Cockroach steps: "),
            ("Aedes breeding near the tank", "Mosquito prevention: "),
            ("Found bedbugs in the hotel", "Bed bug advice: "),
            ("Ants all over the sugar jar", "Ant control: "),
            ("My dog keeps biting its fur, fleas?", "Flea control: "),
            ("So many flies near the bins", "Fly control: "),
        ];
        for (question, intro) in cases {
            let reply = local_reply(question);
            assert!(
                reply.answer.starts_with(intro),
                "{question:?} gave {:?}",
                reply.answer
            );
            assert_eq!(reply.note, NOTE_LOCAL);
        }
    }

    #[test]
    fn test_earlier_topic_wins_on_overlap() {
        // Both rats and fleas are named; rodents come first
        let reply = local_reply("rats brought fleas into the house");
        assert!(reply.answer.starts_with("For rodents: "));

        // "bed bugs" is ahead of "ants"
        let reply = local_reply("bed bugs and ants everywhere");
        assert!(reply.answer.starts_with("Bed bug advice: "));
    }

    #[test]
    fn test_topic_short_circuits_safety() {
        let reply = local_reply("how do I mix poison to kill termites");
        assert!(reply.answer.starts_with("Termite guidance: "));
        assert_eq!(reply.note, NOTE_LOCAL);
    }

    #[test]
    fn test_safety_without_topic() {
        let reply = local_reply("is it safe to mix bleach and ammonia");
        assert_eq!(reply.answer, SAFETY_ANSWER);
        assert_eq!(reply.note, NOTE_SAFETY);
    }

    #[test]
    fn test_safety_before_topics() {
        let responder = FallbackResponder::new(SafetyOrder::BeforeTopics);

        let reply = responder.local_reply("how do I mix poison to kill termites");
        assert_eq!(reply.note, NOTE_SAFETY);

        // Vague input is still answered with a clarifying question
        assert_eq!(responder.local_reply("poison").answer, CLARIFY_ANSWER);

        // Harmless pest questions are unchanged
        let reply = responder.local_reply("Ants all over the sugar jar");
        assert!(reply.answer.starts_with("Ant control: "));
    }

    #[test]
    fn test_canned_text_is_exact() {
        assert_eq!(
            local_reply("").answer,
            "Hi \u{2014} I can help with pest prevention, identification, and treatment advice. \
Tell me what pest you have (rats, termites, cockroaches, mosquitoes, bedbugs, ants, fleas, flies), \
where you see them, and any photos or symptoms. I will then give step-by-step, safe guidance."
        );
        assert_eq!(
            local_reply("Termites in the door frame").answer,
            "Termite guidance: Check for mud tubes on foundations and soft or hollow-sounding timber. \
Reduce wood-to-soil contact and remove damp timber where possible. \
Avoid DIY insecticide drenches for large infestations \u{2014} contact a licensed pest control company \
for inspection and a treatment plan (chemical or baiting). \
Prevent: improve drainage, ventilate crawl spaces, store firewood away from the house."
        );
    }

    #[test]
    fn test_default_answer() {
        let reply = local_reply("Something scurries in the ceiling at night");
        assert_eq!(reply.answer, DEFAULT_ANSWER);
        assert_eq!(reply.note, NOTE_LOCAL);
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        assert_eq!(
            local_reply("  I HAVE RATS IN MY KITCHEN  "),
            local_reply("i have rats in my kitchen")
        );
    }

    #[test]
    fn test_pure() {
        let q = "Mosquitoes keep biting the kids";
        assert_eq!(local_reply(q), local_reply(q));
        assert!(!local_reply(q).answer.is_empty());
    }
}
