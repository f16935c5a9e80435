// SPDX-License-Identifier: MIT

mod common;

use crate::common::utils;

use voseq::records::{GeneSet, Primer, Sex, TaxonSet, Voucher};

#[test]
fn voucher_roundtrip_and_update() {
    let mut rig = utils::Rig::new();
    let mut voucher = Voucher::new("CP100-10");
    voucher.genus = String::from("Euptychia");
    voucher.species = String::from("ordinata");
    voucher.sex = Sex::Female;
    voucher.latitude = Some(-12.35);
    voucher.longitude = Some(-70.45);
    rig.store.save_voucher(&mut voucher).expect("saving voucher");
    let created = voucher.created;

    let back = rig
        .store
        .voucher("CP100-10")
        .expect("querying voucher")
        .expect("voucher exists");
    assert_eq!("Euptychia", back.genus);
    assert_eq!(Sex::Female, back.sex);
    assert_eq!(Some(-12.35), back.latitude);
    assert_eq!(created, back.created);

    // An update keeps the creation time and refreshes the modification time.
    let mut edited = back;
    edited.species = String::from("sophiae");
    rig.store.save_voucher(&mut edited).expect("updating voucher");
    let back = rig
        .store
        .voucher("CP100-10")
        .expect("querying voucher")
        .expect("voucher exists");
    assert_eq!("sophiae", back.species);
    assert_eq!(created, back.created);
    assert!(back.modified >= back.created);
}

#[test]
fn voucher_code_must_be_pipe_free() {
    let mut rig = utils::Rig::new();
    let mut voucher = Voucher::new("CP|100");
    assert!(
        rig.store.save_voucher(&mut voucher).is_err(),
        "codes containing '|' would corrupt FASTA export ids"
    );
}

#[test]
fn sequence_counts_follow_the_text() {
    let mut rig = utils::Rig::new();
    rig.seed_voucher("CP100-10");
    let mut sequence = rig.seed_sequence("CP100-10", "COI", "??GAATTC-N");
    assert_eq!(10, sequence.total_number_bp);
    assert_eq!(4, sequence.number_ambiguous_bp);
    let time_created = sequence.time_created;

    sequence.sequences = String::from("GAATTC");
    rig.store
        .save_sequence(&mut sequence)
        .expect("updating sequence");
    let back = rig
        .store
        .sequence("CP100-10", "COI")
        .expect("querying sequence")
        .expect("sequence exists");
    assert_eq!(6, back.total_number_bp);
    assert_eq!(0, back.number_ambiguous_bp);
    assert_eq!(time_created, back.time_created);
    assert!(back.time_edited >= back.time_created);
}

#[test]
fn one_sequence_per_voucher_and_gene() {
    let mut rig = utils::Rig::new();
    rig.seed_voucher("CP100-10");
    rig.seed_sequence("CP100-10", "COI", "GAATTC");
    let mut duplicate = voseq::records::Sequence::new("CP100-10", "COI", "TTGCCG");
    assert!(rig.store.save_sequence(&mut duplicate).is_err());
}

#[test]
fn voucher_delete_restricted_while_referenced() {
    let mut rig = utils::Rig::new();
    rig.seed_voucher("CP100-10");
    let sequence = rig.seed_sequence("CP100-10", "COI", "GAATTC");
    assert!(
        rig.store.delete_voucher("CP100-10").is_err(),
        "delete must be restricted while a sequence references the code"
    );
    rig.store
        .delete_sequence(sequence.id)
        .expect("deleting sequence");
    rig.store
        .delete_voucher("CP100-10")
        .expect("deleting voucher after its sequences are gone");
}

#[test]
fn primers_attach_to_sequences() {
    let mut rig = utils::Rig::new();
    rig.seed_voucher("CP100-10");
    let sequence = rig.seed_sequence("CP100-10", "COI", "GAATTC");
    let mut primer = Primer::new(sequence.id, "LCO1490", "HCO2198");
    rig.store.save_primer(&mut primer).expect("saving primer");
    let primers = rig
        .store
        .primers_for_sequence(sequence.id)
        .expect("querying primers");
    assert_eq!(1, primers.len());
    assert_eq!("LCO1490", primers[0].primer_f);

    let mut orphan = Primer::new(9999, "LCO1490", "HCO2198");
    assert!(
        rig.store.save_primer(&mut orphan).is_err(),
        "primers must not be saved without their sequence"
    );
}

#[test]
fn set_lists_are_normalized_on_save() {
    let mut rig = utils::Rig::new();
    let mut genes = GeneSet::new("barcoding", " COI \n\n  EF1a\n \n16S ");
    rig.store.save_gene_set(&mut genes).expect("saving gene set");
    assert_eq!("COI\nEF1a\n16S", genes.items);
    let back = rig
        .store
        .gene_set("barcoding")
        .expect("querying gene set")
        .expect("gene set exists");
    assert_eq!("COI\nEF1a\n16S", back.items);

    let mut taxa = TaxonSet::new("satyrines", "Euptychia ordinata\n\n Euptychia sophiae ");
    rig.store
        .save_taxon_set(&mut taxa)
        .expect("saving taxon set");
    assert_eq!("Euptychia ordinata\nEuptychia sophiae", taxa.items);
}

#[test]
fn gene_reading_frame_is_validated() {
    let mut rig = utils::Rig::new();
    let mut gene = voseq::records::Gene::new("COI");
    gene.reading_frame = Some(2);
    rig.store.save_gene(&mut gene).expect("saving gene");
    gene.reading_frame = Some(4);
    assert!(rig.store.save_gene(&mut gene).is_err());
}
