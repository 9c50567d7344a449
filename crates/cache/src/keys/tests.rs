//! Tests for cache key derivation

#[cfg(test)]
mod key_tests {
    use crate::keys::{canonicalize, digest, hexdigest, Callable, Function, Parameter, Signature};
    use crate::serialization::Codec;
    use crate::value::{kwargs, Kwargs, Value};
    use proptest::prelude::*;

    fn add() -> Function {
        Function::sync("tests::add", |args, _kwargs| {
            let total: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(Value::Int(total))
        })
        .with_signature(
            Signature::new(vec![
                Parameter::positional("a"),
                Parameter::positional("b").with_default(1),
            ])
            .unwrap(),
        )
    }

    struct Unencodable;

    #[test]
    fn test_canonical_form() {
        let codec = Codec::default();
        let signature = canonicalize(&codec, &add(), &[Value::Int(1)], &Kwargs::new()).unwrap();
        assert_eq!(
            signature.canonical_json(),
            r#"{"args":[1,1],"kind":"call","target":"tests::add"}"#
        );
    }

    #[test]
    fn test_equivalent_calls_share_a_key() {
        let codec = Codec::default();
        let f = add();
        let calls = [
            hexdigest(&codec, &f, &[Value::Int(1), Value::Int(2)], &Kwargs::new()),
            hexdigest(&codec, &f, &[Value::Int(1)], &kwargs([("b", 2)])),
            hexdigest(&codec, &f, &[], &kwargs([("a", 1), ("b", 2)])),
        ];
        let keys: Vec<_> = calls.into_iter().map(Result::unwrap).collect();
        assert_eq!(keys[0], keys[1]);
        assert_eq!(keys[1], keys[2]);
        assert_eq!(keys[0].as_str().len(), 56);
        assert!(keys[0]
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_default_is_part_of_key() {
        let codec = Codec::default();
        let f = add();
        let implicit = hexdigest(&codec, &f, &[Value::Int(1)], &Kwargs::new()).unwrap();
        let explicit =
            hexdigest(&codec, &f, &[Value::Int(1), Value::Int(1)], &Kwargs::new()).unwrap();
        let different =
            hexdigest(&codec, &f, &[Value::Int(1), Value::Int(3)], &Kwargs::new()).unwrap();
        assert_eq!(implicit, explicit);
        assert_ne!(implicit, different);
    }

    #[test]
    fn test_callable_name_is_part_of_key() {
        let codec = Codec::default();
        let renamed = Function::sync("tests::other", |_, _| Ok(Value::Null));
        let plain = Function::sync("tests::add", |_, _| Ok(Value::Null));
        let args = [Value::Int(1), Value::Int(1)];
        assert_ne!(
            hexdigest(&codec, &renamed, &args, &Kwargs::new()).unwrap(),
            hexdigest(&codec, &plain, &args, &Kwargs::new()).unwrap()
        );
        assert_eq!(
            hexdigest(&codec, &plain, &args, &Kwargs::new()).unwrap(),
            hexdigest(&codec, &add(), &args, &Kwargs::new()).unwrap()
        );
    }

    #[test]
    fn test_unencodable_argument_is_encode_error() {
        let codec = Codec::default();
        let err = hexdigest(
            &codec,
            &add(),
            &[Value::object(Unencodable)],
            &Kwargs::new(),
        )
        .unwrap_err();
        assert!(err.is_encode());
    }

    #[test]
    fn test_bad_binding_is_invalid_call() {
        let codec = Codec::default();
        let err = hexdigest(&codec, &add(), &[], &Kwargs::new()).unwrap_err();
        assert!(err.to_string().contains("tests::add"));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_function_is_callable() {
        let f = add();
        assert_eq!(f.qualified_name(), "tests::add");
        let result = f
            .call(vec![Value::Int(2), Value::Int(3)], Kwargs::new())
            .await
            .unwrap();
        assert_eq!(result, Value::Int(5));
    }

    proptest! {
        #[test]
        fn prop_digest_is_deterministic(
            a in any::<i64>(),
            b in "[ -~]{0,16}",
            names in prop::collection::btree_map("[a-z]{1,5}", any::<i32>(), 0..4),
        ) {
            let codec = Codec::default();
            let f = Function::sync("tests::any", |_, _| Ok(Value::Null));
            let kw: Kwargs = names.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect();
            let args = [Value::Int(a), Value::String(b)];

            let first = digest(&canonicalize(&codec, &f, &args, &kw).unwrap());
            let second = digest(&canonicalize(&codec, &f, &args.clone(), &kw.clone()).unwrap());
            prop_assert_eq!(first, second);
        }
    }
}
