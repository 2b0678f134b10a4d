use vdmpf_fss::*;

#[test]
fn test_glob_import_resolves_engines() {
    let prf_key = generate_prf_key();
    let engine = Vdmpf::new(&prf_key, HashKeyPair::generate()).unwrap();
    let (key_a, key_b) = engine.gen(&[3, 12], 4, 2, 2, &[1, 2, 3, 4]).unwrap();

    let (out_a, proof_a) = engine.batch_ver_eval(&key_a, &[12, 3]).unwrap();
    let (out_b, proof_b) = engine.batch_ver_eval(&key_b, &[12, 3]).unwrap();
    assert_eq!(proof_a, proof_b);
    assert_eq!(fss::reconstruct(&out_a, &out_b).unwrap(), vec![3, 4, 1, 2]);

    let dpf = vdpf::Vdpf::new(&prf_key, *engine.hash_keys()).unwrap();
    let (point_a, point_b) = dpf.dpf().gen(7, 3, 1, &[9]).unwrap();
    assert_eq!(fss::evaluate_pair(dpf.dpf(), &point_a, &point_b, 7).unwrap(), vec![9]);
    assert_eq!(MAX_FULL_DOMAIN_BITS, 32);
}
